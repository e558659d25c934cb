use crate::frames::{BridgeFrame, ServerFrame};
use crate::host::RemoteHost;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use trailmark_engine::OrchestratorHandle;

/// Dispatch frames from the extension until the server side closes.
///
/// Host replies complete pending [`RemoteHost`] calls. Everything else goes to the
/// orchestrator in arrival order. Responses are awaited on their own tasks: the
/// orchestrator may itself be waiting on a host reply that only this loop can deliver.
pub async fn route_frames(
    mut inbound: mpsc::Receiver<BridgeFrame>,
    host: Arc<RemoteHost>,
    handle: OrchestratorHandle,
    outbound: broadcast::Sender<ServerFrame>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame {
            BridgeFrame::HostReply { id, result } => {
                host.resolve(id, result).await;
            }
            BridgeFrame::Runtime {
                tab_id,
                request_id: Some(request_id),
                message,
            } => {
                let response = match handle.submit(tab_id, message) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Orchestrator unavailable: {}", e);
                        break;
                    }
                };
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    if let Ok(response) = response.await {
                        let _ = outbound.send(ServerFrame::Response {
                            request_id,
                            response,
                        });
                    }
                });
            }
            BridgeFrame::Runtime {
                tab_id,
                request_id: None,
                message,
            } => {
                if let Err(e) = handle.notify(tab_id, message) {
                    warn!("Orchestrator unavailable: {}", e);
                    break;
                }
            }
            BridgeFrame::TabEvent { event } => {
                if let Err(e) = handle.tab_event(event) {
                    warn!("Orchestrator unavailable: {}", e);
                    break;
                }
            }
        }
    }
    debug!("frame router stopped");
}
