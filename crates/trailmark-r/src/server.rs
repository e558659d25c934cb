use crate::frames::{BridgeFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket endpoint the browser extension connects to.
#[derive(Clone)]
pub struct RemoteServer {
    host: String,
    port: u16,
    // Server -> extension frames fan out to every live connection (usually one).
    outbound: broadcast::Sender<ServerFrame>,
}

pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub outbound: broadcast::Sender<ServerFrame>,
    pub inbound: mpsc::Receiver<BridgeFrame>,
}

impl RemoteServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (outbound, _) = broadcast::channel(100);
        Self {
            host: host.into(),
            port,
            outbound,
        }
    }

    pub fn outbound(&self) -> broadcast::Sender<ServerFrame> {
        self.outbound.clone()
    }

    pub async fn start(&self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let local_addr = listener.local_addr()?;
        info!("Remote server listening on: {}", local_addr);

        let (inbound_tx, inbound) = mpsc::channel(100);
        let outbound = self.outbound.clone();

        tokio::spawn(async move {
            debug!("Server accept loop started");
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        break;
                    }
                };
                info!("Accepted TCP connection from: {}", peer);
                // Subscribe before the handshake so frames sent meanwhile are not lost.
                let frames = outbound.subscribe();
                tokio::spawn(accept_connection(stream, frames, inbound_tx.clone()));
            }
        });

        Ok(ServerHandle {
            local_addr,
            outbound: self.outbound.clone(),
            inbound,
        })
    }
}

async fn accept_connection(
    stream: TcpStream,
    mut frames: broadcast::Receiver<ServerFrame>,
    inbound: mpsc::Sender<BridgeFrame>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("Error during the websocket handshake occurred: {}", e);
            return;
        }
    };

    info!("New WebSocket connection: established");
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Connection lagged, {} frames dropped", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    error!("Failed to send message to WS: {}", e);
                    break;
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<BridgeFrame>(&text) {
                            Ok(frame) => {
                                if inbound.send(frame).await.is_err() {
                                    error!("Frame router is gone");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse frame from extension: {} | Text: {}", e, text);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
