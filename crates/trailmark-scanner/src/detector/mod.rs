//! Page-local interaction detectors.
//!
//! Detectors turn raw DOM events into interaction records and push them onto an
//! outbound channel as [`RuntimeMessage`]s. Events are delivered in capture order by
//! whoever owns the page (see [`crate::content::ContentScript`]).

pub mod click;
pub mod input;

pub use click::ClickDetector;
pub use input::InputDetector;

use crate::dom::{Document, NodeId};
use crate::highlight::RECORDER_UI_ATTRIBUTE;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trailmark_common::protocol::RuntimeMessage;

/// Input types that take typed text. Clicks on any other input are discrete choices,
/// and only these are debounced as free text.
pub const TEXT_LIKE_INPUT_TYPES: &[&str] = &[
    "text", "email", "password", "search", "tel", "url", "number", "date", "datetime-local",
    "month", "time", "week",
];

/// Outbound channel for interaction records.
pub type Emitter = mpsc::UnboundedSender<RuntimeMessage>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomEventKind {
    Click,
    /// Value edited (`input`).
    Input,
    /// Value committed (`change`).
    Change,
    Blur,
}

/// A raw DOM event as observed in the capture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomEvent {
    pub kind: DomEventKind,
    pub target: NodeId,
}

impl DomEvent {
    pub fn new(kind: DomEventKind, target: NodeId) -> Self {
        Self { kind, target }
    }
}

/// Whether `node` sits inside the recorder's own UI.
pub fn is_recorder_ui<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if doc.is_element(n) && doc.attribute(n, RECORDER_UI_ATTRIBUTE).is_some() {
            return true;
        }
        current = doc.parent(n);
    }
    false
}

/// Recording state shared by both detectors.
#[derive(Debug, Default)]
struct Tracking {
    start_epoch: i64,
    emit: Option<Emitter>,
}

impl Tracking {
    fn start(&mut self, start_epoch: i64, emit: Emitter) {
        self.start_epoch = start_epoch;
        self.emit = Some(emit);
    }

    fn stop(&mut self) {
        self.emit = None;
    }

    fn is_active(&self) -> bool {
        self.emit.is_some()
    }

    fn relative(&self, now_ms: i64) -> i64 {
        (now_ms - self.start_epoch).max(0)
    }

    fn send(&self, message: RuntimeMessage) {
        if let Some(emit) = &self.emit
            && emit.send(message).is_err()
        {
            tracing::warn!("interaction dropped: orchestrator channel closed");
        }
    }
}
