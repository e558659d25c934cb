use async_trait::async_trait;
pub use trailmark_common::error::HostError;
use trailmark_common::model::TabId;
use trailmark_common::protocol::{ContentCommand, ContentReply, TabInfo};

/// Browser capabilities the orchestrator consumes. Implemented by whatever hosts the
/// recorder (the WebSocket bridge in `trailmark-r`, or a mock in tests).
///
/// Every call may fail when the remote context is gone; callers treat all of these
/// failures as recoverable.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// The tab the user is looking at, if any.
    async fn query_active_tab(&self) -> Result<Option<TabInfo>, HostError>;

    /// Current URL and title of a tab.
    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError>;

    /// Screenshot of the tab's visible area, as an image data URL.
    async fn capture_visible_area(&self, tab_id: TabId) -> Result<String, HostError>;

    /// Deliver a command to the recorder runtime in a tab.
    async fn send_to_tab(
        &self,
        tab_id: TabId,
        command: ContentCommand,
    ) -> Result<ContentReply, HostError>;

    /// Load the recorder runtime into a tab that does not have it yet.
    async fn inject_content_script(&self, _tab_id: TabId) -> Result<(), HostError> {
        Err(HostError::Injection("not supported by this host".into()))
    }
}
