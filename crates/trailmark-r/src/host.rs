use crate::frames::{HostCall, HostCallResult, ServerFrame};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, oneshot};
use tracing::{debug, warn};
use trailmark_common::model::TabId;
use trailmark_common::protocol::{ContentCommand, ContentReply, TabInfo};
use trailmark_engine::host::{BrowserHost, HostError};

/// How long a host call waits for the extension's reply.
pub const HOST_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// [`BrowserHost`] backed by the connected browser extension.
///
/// Each capability call becomes a `HOST_CALL` frame with a fresh id; the matching
/// `HOST_REPLY` is handed back through [`RemoteHost::resolve`].
pub struct RemoteHost {
    outbound: broadcast::Sender<ServerFrame>,
    pending: Mutex<HashMap<u64, oneshot::Sender<HostCallResult>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl RemoteHost {
    pub fn new(outbound: broadcast::Sender<ServerFrame>) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout: HOST_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.receiver_count() > 0
    }

    /// Complete the call waiting on `id`. Returns false for unknown or expired ids.
    pub async fn resolve(&self, id: u64, result: HostCallResult) -> bool {
        match self.pending.lock().await.remove(&id) {
            Some(waiter) => waiter.send(result).is_ok(),
            None => {
                debug!(id, "reply for unknown host call");
                false
            }
        }
    }

    async fn call(&self, call: HostCall) -> Result<HostCallResult, HostError> {
        if !self.is_connected() {
            return Err(HostError::NotConnected);
        }
        let method = call.method();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.outbound.send(ServerFrame::HostCall { id, call }).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(HostError::NotConnected);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(HostError::ConnectionLost),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                warn!(id, method, "host call timed out");
                Err(HostError::Timeout(method.to_string()))
            }
        }
    }
}

fn unexpected(call: &str, result: HostCallResult) -> HostError {
    HostError::UnexpectedReply {
        call: call.to_string(),
        reply: format!("{:?}", result),
    }
}

#[async_trait]
impl BrowserHost for RemoteHost {
    async fn query_active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        match self.call(HostCall::QueryActiveTab).await? {
            HostCallResult::ActiveTab { tab } => Ok(tab),
            HostCallResult::Error { message } => Err(HostError::Other(message)),
            other => Err(unexpected("query_active_tab", other)),
        }
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError> {
        match self.call(HostCall::GetTab { tab_id }).await? {
            HostCallResult::Tab { tab } => Ok(tab),
            HostCallResult::Error { message } => {
                debug!(tab_id, message, "tab lookup failed");
                Err(HostError::TabNotFound(tab_id))
            }
            other => Err(unexpected("get_tab", other)),
        }
    }

    async fn capture_visible_area(&self, tab_id: TabId) -> Result<String, HostError> {
        match self.call(HostCall::CaptureVisibleArea { tab_id }).await? {
            HostCallResult::Image { data_url } => Ok(data_url),
            HostCallResult::Error { message } => Err(HostError::Capture(message)),
            other => Err(unexpected("capture_visible_area", other)),
        }
    }

    async fn send_to_tab(
        &self,
        tab_id: TabId,
        command: ContentCommand,
    ) -> Result<ContentReply, HostError> {
        match self.call(HostCall::SendToTab { tab_id, command }).await? {
            HostCallResult::Reply { reply } => Ok(reply),
            HostCallResult::Error { message } => Err(HostError::Unreachable {
                tab_id,
                reason: message,
            }),
            other => Err(unexpected("send_to_tab", other)),
        }
    }

    async fn inject_content_script(&self, tab_id: TabId) -> Result<(), HostError> {
        match self.call(HostCall::InjectContentScript { tab_id }).await? {
            HostCallResult::Done => Ok(()),
            HostCallResult::Error { message } => Err(HostError::Injection(message)),
            other => Err(unexpected("inject_content_script", other)),
        }
    }
}
