use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use trailmark_common::clock::SystemClock;
use trailmark_common::protocol::{ContentCommand, ContentReply, RuntimeResponse, TabInfo, TabStatus};
use trailmark_engine::{BrowserHost, HostError, Orchestrator, OrchestratorHandle};
use trailmark_r::{
    route_frames, HostCall, HostCallResult, RemoteHost, RemoteServer, ServerFrame, ServerHandle,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_simulated_client(handle: &ServerHandle) -> Client {
    let url = format!("ws://{}", handle.local_addr);
    for _ in 0..10 {
        if let Ok((ws_stream, _)) = connect_async(&url).await {
            return ws_stream;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to simulated server");
}

async fn wait_connected(host: &RemoteHost) {
    for _ in 0..50 {
        if host.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("extension never registered");
}

async fn next_frame(client: &mut Client) -> ServerFrame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for frame")
            .expect("Client stream ended unexpectedly")
            .expect("WS error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("Failed to deserialize frame");
        }
    }
}

async fn send_json(client: &mut Client, value: serde_json::Value) {
    client
        .send(Message::Text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

fn example_tab() -> TabInfo {
    TabInfo {
        id: 3,
        url: "https://example.com/login".into(),
        title: "Login".into(),
        opener_tab_id: None,
        status: TabStatus::Complete,
    }
}

/// What a cooperative extension answers to each host call.
fn answer(call: &HostCall) -> HostCallResult {
    match call {
        HostCall::QueryActiveTab => HostCallResult::ActiveTab {
            tab: Some(example_tab()),
        },
        HostCall::GetTab { .. } => HostCallResult::Tab { tab: example_tab() },
        HostCall::CaptureVisibleArea { .. } => HostCallResult::Image {
            data_url: "data:image/png;base64,AAAA".into(),
        },
        HostCall::SendToTab { .. } => HostCallResult::Reply {
            reply: ContentReply::Ack,
        },
        HostCall::InjectContentScript { .. } => HostCallResult::Done,
    }
}

/// Server, remote host, router and orchestrator wired the way the binary does it.
async fn start_bridge() -> (Client, Arc<RemoteHost>, OrchestratorHandle) {
    let server = RemoteServer::new("127.0.0.1", 0);
    let handle = server.start().await.expect("Failed to start server");
    let host = Arc::new(RemoteHost::new(handle.outbound.clone()));
    let client = connect_simulated_client(&handle).await;
    wait_connected(&host).await;

    let orchestrator = Orchestrator::new(host.clone(), Arc::new(SystemClock));
    let (orchestrator_handle, inbox) = OrchestratorHandle::channel();
    let ServerHandle {
        inbound, outbound, ..
    } = handle;
    tokio::spawn(route_frames(
        inbound,
        host.clone(),
        orchestrator_handle.clone(),
        outbound,
    ));
    tokio::spawn(orchestrator.run(inbox));
    (client, host, orchestrator_handle)
}

#[tokio::test]
async fn test_host_call_round_trip() {
    let (mut client, host, _orchestrator) = start_bridge().await;

    let call = tokio::spawn({
        let host = host.clone();
        async move { host.query_active_tab().await }
    });

    let (id, method) = match next_frame(&mut client).await {
        ServerFrame::HostCall { id, call } => (id, call.method()),
        other => panic!("unexpected frame: {:?}", other),
    };
    assert_eq!(method, "query_active_tab");

    send_json(
        &mut client,
        json!({
            "type": "HOST_REPLY",
            "id": id,
            "result": {
                "outcome": "active_tab",
                "tab": { "id": 7, "url": "https://example.com", "title": "Example", "status": "complete" }
            }
        }),
    )
    .await;

    let tab = call.await.unwrap().unwrap().expect("active tab");
    assert_eq!(tab.id, 7);
    assert_eq!(tab.title, "Example");
}

#[tokio::test]
async fn test_runtime_request_gets_response_frame() {
    let (mut client, _host, _orchestrator) = start_bridge().await;

    send_json(
        &mut client,
        json!({
            "type": "RUNTIME",
            "requestId": 41,
            "message": { "type": "GET_RECORDING_STATE" }
        }),
    )
    .await;

    match next_frame(&mut client).await {
        ServerFrame::Response {
            request_id,
            response: RuntimeResponse::State {
                is_recording,
                session,
            },
        } => {
            assert_eq!(request_id, 41);
            assert!(!is_recording);
            assert!(session.is_none());
        }
        other => panic!("unexpected frame: {:?}", other),
    }
}

#[tokio::test]
async fn test_start_recording_drives_host_calls_through_bridge() {
    let (mut client, _host, _orchestrator) = start_bridge().await;

    send_json(
        &mut client,
        json!({
            "type": "RUNTIME",
            "requestId": 1,
            "message": { "type": "START_RECORDING", "title": "Login flow" }
        }),
    )
    .await;

    let mut methods = Vec::new();
    let session = loop {
        match next_frame(&mut client).await {
            ServerFrame::HostCall { id, call } => {
                methods.push(call.method());
                if let HostCall::SendToTab { command, .. } = &call {
                    assert!(matches!(command, ContentCommand::EnableRecording(_)));
                }
                let result = serde_json::to_value(answer(&call)).unwrap();
                send_json(
                    &mut client,
                    json!({ "type": "HOST_REPLY", "id": id, "result": result }),
                )
                .await;
            }
            ServerFrame::Response {
                request_id,
                response: RuntimeResponse::Session { session },
            } => {
                assert_eq!(request_id, 1);
                break session.expect("session started");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    };

    assert_eq!(methods[0], "query_active_tab");
    assert!(methods.contains(&"send_to_tab"));
    assert!(methods.contains(&"capture_visible_area"));
    assert!(!methods.contains(&"inject_content_script"));

    assert_eq!(session.title, "Login flow");
    assert!(session.is_active);
    assert_eq!(session.steps.len(), 1);
    assert_eq!(session.steps[0].url, "https://example.com/login");
    assert_eq!(
        session.steps[0].screenshot.as_deref(),
        Some("data:image/png;base64,AAAA")
    );
}

#[tokio::test]
async fn test_unknown_frames_are_skipped() {
    let (mut client, _host, _orchestrator) = start_bridge().await;

    client
        .send(Message::Text("{\"type\":\"BOGUS\"}".into()))
        .await
        .unwrap();
    send_json(
        &mut client,
        json!({ "type": "RUNTIME", "requestId": 2, "message": { "type": "STOP_RECORDING" } }),
    )
    .await;

    match next_frame(&mut client).await {
        ServerFrame::Response {
            request_id,
            response: RuntimeResponse::Session { session },
        } => {
            assert_eq!(request_id, 2);
            assert!(session.is_none());
        }
        other => panic!("unexpected frame: {:?}", other),
    }
}

#[tokio::test]
async fn test_host_without_extension_is_not_connected() {
    let (outbound, _) = broadcast::channel(4);
    let host = RemoteHost::new(outbound);

    let err = host.query_active_tab().await.unwrap_err();
    assert!(matches!(err, HostError::NotConnected));
}

#[tokio::test]
async fn test_host_call_times_out() {
    let (outbound, _extension) = broadcast::channel(4);
    let host = RemoteHost::new(outbound).with_timeout(Duration::from_millis(50));

    let err = host.capture_visible_area(3).await.unwrap_err();
    match err {
        HostError::Timeout(method) => assert_eq!(method, "capture_visible_area"),
        other => panic!("unexpected error: {:?}", other),
    }
    // A late reply finds nothing waiting.
    assert!(!host.resolve(1, HostCallResult::Done).await);
}

#[tokio::test]
async fn test_error_results_map_to_host_errors() {
    let (outbound, mut extension) = broadcast::channel(8);
    let host = Arc::new(RemoteHost::new(outbound));

    let responder = tokio::spawn({
        let host = host.clone();
        async move {
            for _ in 0..3 {
                let Ok(ServerFrame::HostCall { id, .. }) = extension.recv().await else {
                    panic!("expected a host call");
                };
                host.resolve(
                    id,
                    HostCallResult::Error {
                        message: "Receiving end does not exist".into(),
                    },
                )
                .await;
            }
        }
    });

    let err = host
        .send_to_tab(5, ContentCommand::Ping)
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Unreachable { tab_id: 5, .. }));

    let err = host.get_tab(5).await.unwrap_err();
    assert!(matches!(err, HostError::TabNotFound(5)));

    let err = host.inject_content_script(5).await.unwrap_err();
    assert!(matches!(err, HostError::Injection(_)));

    responder.await.unwrap();
}

#[tokio::test]
async fn test_mismatched_result_is_unexpected_reply() {
    let (outbound, mut extension) = broadcast::channel(8);
    let host = Arc::new(RemoteHost::new(outbound));

    tokio::spawn({
        let host = host.clone();
        async move {
            if let Ok(ServerFrame::HostCall { id, .. }) = extension.recv().await {
                host.resolve(id, HostCallResult::Done).await;
            }
        }
    });

    let err = host.capture_visible_area(1).await.unwrap_err();
    assert!(matches!(err, HostError::UnexpectedReply { .. }));
}
