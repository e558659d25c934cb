//! Recording data model.
//!
//! `RecordingSession` is the aggregate root: it owns the ordered step list and the
//! annotation set. Steps are append-only; insertion order is chronological order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Browser tab identifier as reported by the host.
pub type TabId = i64;

/// Maximum length (in characters) of extracted labels and class summaries.
pub const MAX_LABEL_CHARS: usize = 100;

/// Allocate a fresh identifier for sessions, steps and annotations.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim and truncate to [`MAX_LABEL_CHARS`] characters.
pub fn truncate_label(text: &str) -> String {
    text.trim().chars().take(MAX_LABEL_CHARS).collect::<String>().trim_end().to_string()
}

/// Immutable snapshot of an interacted element, taken at detection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    pub text: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Navigation,
    Click,
    Input,
}

/// One recorded unit of interaction or navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStep {
    pub id: String,
    /// Milliseconds since session start.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub tab_id: TabId,
    pub tab_title: String,
    pub url: String,
    /// Captured image reference (data URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sensitive: Option<bool>,
}

/// Free-text note anchored to a timeline position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub text: String,
    /// Milliseconds since session start.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: String,
    pub title: String,
    /// Unix epoch milliseconds; detectors compute relative timestamps from it.
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub is_active: bool,
    pub audio_enabled: bool,
    #[serde(default)]
    pub steps: Vec<RecordingStep>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub tracked_tabs: BTreeSet<TabId>,
}

impl RecordingSession {
    pub fn new(title: impl Into<String>, start_time: i64, audio_enabled: bool) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            start_time,
            end_time: None,
            is_active: true,
            audio_enabled,
            steps: Vec::new(),
            annotations: Vec::new(),
            tracked_tabs: BTreeSet::new(),
        }
    }

    /// Milliseconds elapsed since the session started, never negative.
    pub fn elapsed(&self, now_ms: i64) -> i64 {
        (now_ms - self.start_time).max(0)
    }

    pub fn push_step(&mut self, step: RecordingStep) {
        self.steps.push(step);
    }

    /// Most recent step recorded for `tab_id`.
    pub fn last_step_for_tab(&self, tab_id: TabId) -> Option<&RecordingStep> {
        self.steps.iter().rev().find(|s| s.tab_id == tab_id)
    }

    pub fn add_annotation(&mut self, text: impl Into<String>, timestamp: i64) -> Annotation {
        let annotation = Annotation {
            id: new_id(),
            text: text.into(),
            timestamp,
        };
        self.annotations.push(annotation.clone());
        annotation
    }

    /// Returns false (and changes nothing) when the id is unknown.
    pub fn update_annotation(&mut self, id: &str, text: impl Into<String>) -> bool {
        match self.annotations.iter_mut().find(|a| a.id == id) {
            Some(annotation) => {
                annotation.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn delete_annotation(&mut self, id: &str) -> bool {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.id != id);
        self.annotations.len() != before
    }

    /// Mark the session inactive with an end time. Later calls keep the first end time.
    pub fn finalize(&mut self, end_time: i64) {
        self.is_active = false;
        if self.end_time.is_none() {
            self.end_time = Some(end_time);
        }
    }
}
