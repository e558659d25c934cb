//! WebSocket frames exchanged with the browser extension.
//!
//! Every frame is a JSON text message tagged with `type`. Runtime messages and
//! content commands travel nested, so their own `type` tags stay intact.

use serde::{Deserialize, Serialize};
use trailmark_common::model::TabId;
use trailmark_common::protocol::{
    ContentCommand, ContentReply, RuntimeMessage, RuntimeResponse, TabEvent, TabInfo,
};

/// Extension → server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum BridgeFrame {
    /// A runtime message from the UI (no tab) or from a page (its tab).
    Runtime {
        #[serde(default)]
        tab_id: Option<TabId>,
        /// Present when the extension wants a `RESPONSE` frame back.
        #[serde(default)]
        request_id: Option<u64>,
        message: RuntimeMessage,
    },
    TabEvent {
        event: TabEvent,
    },
    HostReply {
        id: u64,
        result: HostCallResult,
    },
}

/// Server → extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    HostCall { id: u64, call: HostCall },
    Response {
        request_id: u64,
        response: RuntimeResponse,
    },
}

/// A browser capability invocation carried out by the extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum HostCall {
    QueryActiveTab,
    GetTab { tab_id: TabId },
    CaptureVisibleArea { tab_id: TabId },
    SendToTab { tab_id: TabId, command: ContentCommand },
    InjectContentScript { tab_id: TabId },
}

impl HostCall {
    pub fn method(&self) -> &'static str {
        match self {
            HostCall::QueryActiveTab => "query_active_tab",
            HostCall::GetTab { .. } => "get_tab",
            HostCall::CaptureVisibleArea { .. } => "capture_visible_area",
            HostCall::SendToTab { .. } => "send_to_tab",
            HostCall::InjectContentScript { .. } => "inject_content_script",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "outcome",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum HostCallResult {
    ActiveTab {
        #[serde(default)]
        tab: Option<TabInfo>,
    },
    Tab { tab: TabInfo },
    Image { data_url: String },
    Reply { reply: ContentReply },
    Done,
    Error { message: String },
}
