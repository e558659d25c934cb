//! Recording orchestration: the session state machine and the host capabilities it
//! drives.

pub mod config;
pub mod host;
pub mod orchestrator;
pub mod tabs;

pub use host::{BrowserHost, HostError};
pub use orchestrator::{
    HIGHLIGHT_SETTLE_DELAY, Inbound, Orchestrator, OrchestratorHandle, SessionEvent, StepRejected,
};
pub use tabs::TrackedTabs;
pub use trailmark_common::protocol;
