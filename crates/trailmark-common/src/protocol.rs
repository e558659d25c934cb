use crate::model::{Annotation, ElementInfo, RecordingSession, RecordingStep, TabId};
use serde::{Deserialize, Serialize};

/// Messages received by the orchestrator, from the UI or from a page's detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    StartRecording(StartRecordingRequest),
    StopRecording,
    ClickEvent(ClickEvent),
    InputEvent(InputEvent),
    AddAnnotation(AddAnnotationRequest),
    UpdateAnnotation(UpdateAnnotationRequest),
    DeleteAnnotation(DeleteAnnotationRequest),
    GetRecordingState,
    ContentScriptReady(ContentScriptReady),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingRequest {
    pub title: String,
    #[serde(default)]
    pub audio_enabled: bool,
}

/// Click interaction recorded by a page's click detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub element: ElementInfo,
    pub url: String,
    /// Milliseconds since the recording-start epoch.
    pub timestamp: i64,
}

/// Committed field value recorded by a page's input detector. `value` is already
/// masked when `is_sensitive` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEvent {
    pub element: ElementInfo,
    pub value: String,
    pub is_sensitive: bool,
    pub url: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAnnotationRequest {
    pub text: String,
    /// Timeline position; defaults to "now" relative to session start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnotationRequest {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAnnotationRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentScriptReady {
    pub url: String,
}

/// Orchestrator answers to [`RuntimeMessage`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RuntimeResponse {
    /// Session snapshot after start or stop. `None` when stop found nothing to stop.
    Session {
        #[serde(default)]
        session: Option<RecordingSession>,
    },
    /// An interaction record became a step.
    Step { step: Box<RecordingStep> },
    /// An interaction record was dropped.
    Rejected { reason: String },
    Annotation {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        annotation: Option<Annotation>,
    },
    State {
        is_recording: bool,
        #[serde(default)]
        session: Option<RecordingSession>,
    },
    Ack,
    Error { code: String, message: String },
}

/// Commands the orchestrator sends into a page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentCommand {
    EnableRecording(EnableRecordingRequest),
    DisableRecording,
    HighlightElement(HighlightRequest),
    HideHighlight,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableRecordingRequest {
    pub start_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRequest {
    pub selector: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContentReply {
    Ack,
    ElementNotFound { selector: String },
    Pong { recording: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    #[default]
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opener_tab_id: Option<TabId>,
    #[serde(default)]
    pub status: TabStatus,
}

/// Tab lifecycle notifications pushed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TabEvent {
    Created {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(rename = "openerTabId", default)]
        opener_tab_id: Option<TabId>,
    },
    Updated {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        status: TabStatus,
        #[serde(default)]
        url: String,
        #[serde(default)]
        title: String,
    },
    Removed {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl TabEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            TabEvent::Created { tab_id, .. }
            | TabEvent::Updated { tab_id, .. }
            | TabEvent::Removed { tab_id } => *tab_id,
        }
    }
}
