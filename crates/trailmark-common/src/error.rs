use crate::model::TabId;
use thiserror::Error;

/// Failures of host capabilities (tab capture, message send, script injection).
///
/// All of these are recoverable from the orchestrator's point of view.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Tab {0} not found")]
    TabNotFound(TabId),

    #[error("Tab {tab_id} unreachable: {reason}")]
    Unreachable { tab_id: TabId, reason: String },

    #[error("Capture failed: {0}")]
    Capture(String),

    #[error("Content script injection failed: {0}")]
    Injection(String),

    #[error("Host call timed out: {0}")]
    Timeout(String),

    #[error("No browser extension connected")]
    NotConnected,

    #[error("Connection to browser extension lost")]
    ConnectionLost,

    #[error("Unexpected reply to {call}: {reply}")]
    UnexpectedReply { call: String, reply: String },

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the recording orchestrator to the initiating caller.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("No active tab to record")]
    NoActiveTab,

    #[error("Orchestrator is no longer running")]
    OrchestratorClosed,
}

impl RecorderError {
    /// Stable code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::NoActiveTab => "NO_ACTIVE_CONTEXT",
            RecorderError::OrchestratorClosed => "ORCHESTRATOR_CLOSED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_messages() {
        let err = HostError::Unreachable {
            tab_id: 4,
            reason: "Receiving end does not exist".into(),
        };
        assert_eq!(err.to_string(), "Tab 4 unreachable: Receiving end does not exist");
        let err = HostError::UnexpectedReply {
            call: "get_tab".into(),
            reply: "done".into(),
        };
        assert_eq!(err.to_string(), "Unexpected reply to get_tab: done");
        assert_eq!(RecorderError::NoActiveTab.code(), "NO_ACTIVE_CONTEXT");
    }
}
