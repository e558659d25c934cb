use super::{DomEvent, DomEventKind, Emitter, TEXT_LIKE_INPUT_TYPES, Tracking, is_recorder_ui};
use crate::describe::{element_info, input_type};
use crate::dom::{Document, NodeId};
use crate::selector::quote_attribute_value;
use std::collections::HashMap;
use std::sync::Arc;
use trailmark_common::protocol::{InputEvent, RuntimeMessage};
use trailmark_common::sensitivity::{FieldDescriptor, KeywordClassifier, SensitivityClassifier};

/// Quiet period after the last edit before a free-text value is recorded.
pub const INPUT_DEBOUNCE_MS: i64 = 1000;

/// Controls whose every change is a single discrete choice.
const DISCRETE_INPUT_TYPES: &[&str] = &["checkbox", "radio"];

pub struct InputDetector {
    tracking: Tracking,
    classifier: Arc<dyn SensitivityClassifier>,
    /// Flush deadline (epoch ms) per element with an unrecorded edit.
    pending: HashMap<NodeId, i64>,
    /// Raw value last recorded per element.
    last_values: HashMap<NodeId, String>,
}

impl std::fmt::Debug for InputDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDetector")
            .field("tracking", &self.tracking)
            .field("pending", &self.pending)
            .field("last_values", &self.last_values.len())
            .finish()
    }
}

impl Default for InputDetector {
    fn default() -> Self {
        Self::new(Arc::new(KeywordClassifier::default()))
    }
}

impl InputDetector {
    pub fn new(classifier: Arc<dyn SensitivityClassifier>) -> Self {
        Self {
            tracking: Tracking::default(),
            classifier,
            pending: HashMap::new(),
            last_values: HashMap::new(),
        }
    }

    pub fn start(&mut self, start_epoch: i64, emit: Emitter) {
        self.tracking.start(start_epoch, emit);
    }

    /// Force-flush every pending element, then drop all per-element state.
    /// A no-op when not started.
    pub fn stop<D: Document + ?Sized>(&mut self, doc: &D, now_ms: i64) {
        if !self.is_active() {
            return;
        }
        let mut pending: Vec<(NodeId, i64)> = self.pending.drain().collect();
        pending.sort_by_key(|(node, deadline)| (*deadline, *node));
        for (node, _) in pending {
            self.record(doc, node, now_ms);
        }
        self.last_values.clear();
        self.tracking.stop();
    }

    pub fn is_active(&self) -> bool {
        self.tracking.is_active()
    }

    /// Earliest pending flush deadline.
    pub fn next_deadline(&self) -> Option<i64> {
        self.pending.values().min().copied()
    }

    pub fn has_pending(&self, node: NodeId) -> bool {
        self.pending.contains_key(&node)
    }

    /// Handle an input, change or blur event. Returns a record emitted right away, if any.
    pub fn on_event<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        event: DomEvent,
        now_ms: i64,
    ) -> Option<InputEvent> {
        if !self.is_active() || event.kind == DomEventKind::Click {
            return None;
        }
        let node = event.target;
        if !is_tracked_field(doc, node) {
            return None;
        }

        if is_discrete(doc, node) {
            return match event.kind {
                DomEventKind::Input | DomEventKind::Change => self.record(doc, node, now_ms),
                _ => None,
            };
        }

        match event.kind {
            DomEventKind::Input | DomEventKind::Change => {
                self.pending.insert(node, now_ms + INPUT_DEBOUNCE_MS);
                None
            }
            DomEventKind::Blur => {
                self.pending.remove(&node)?;
                self.record(doc, node, now_ms)
            }
            DomEventKind::Click => None,
        }
    }

    /// Record every element whose deadline has passed, oldest first.
    pub fn flush_due<D: Document + ?Sized>(&mut self, doc: &D, now_ms: i64) -> Vec<InputEvent> {
        let mut due: Vec<(NodeId, i64)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now_ms)
            .map(|(node, deadline)| (*node, *deadline))
            .collect();
        due.sort_by_key(|(node, deadline)| (*deadline, *node));

        due.into_iter()
            .filter_map(|(node, _)| {
                self.pending.remove(&node);
                self.record(doc, node, now_ms)
            })
            .collect()
    }

    fn record<D: Document + ?Sized>(
        &mut self,
        doc: &D,
        node: NodeId,
        now_ms: i64,
    ) -> Option<InputEvent> {
        let raw = current_value(doc, node);
        if self.last_values.get(&node) == Some(&raw) {
            tracing::debug!(node = node.0, "unchanged value suppressed");
            return None;
        }

        let element = element_info(doc, node);
        let mut label = field_label(doc, node);
        if label.is_empty() {
            label = element.text.clone();
        }
        let field = FieldDescriptor {
            tag_name: element.tag_name.clone(),
            input_type: element.input_type.clone(),
            name: element.name.clone(),
            id: element.id.clone(),
            label,
            autocomplete: doc.attribute(node, "autocomplete"),
        };
        let is_sensitive = self.classifier.is_sensitive(&field);
        let value = if is_sensitive {
            self.classifier.mask(&raw)
        } else {
            raw.clone()
        };
        self.last_values.insert(node, raw);

        let event = InputEvent {
            element,
            value,
            is_sensitive,
            url: doc.url(),
            timestamp: self.tracking.relative(now_ms),
        };
        tracing::debug!(selector = %event.element.selector, is_sensitive, "input recorded");
        self.tracking.send(RuntimeMessage::InputEvent(event.clone()));
        Some(event)
    }
}

fn is_tracked_field<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    if !doc.is_element(node) || is_recorder_ui(doc, node) {
        return false;
    }
    match doc.tag_name(node).as_str() {
        "textarea" | "select" => true,
        "input" => {
            let kind = input_type(doc, node);
            TEXT_LIKE_INPUT_TYPES.contains(&kind.as_str())
                || DISCRETE_INPUT_TYPES.contains(&kind.as_str())
        }
        _ => false,
    }
}

fn is_discrete<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    match doc.tag_name(node).as_str() {
        "select" => true,
        "input" => DISCRETE_INPUT_TYPES.contains(&input_type(doc, node).as_str()),
        _ => false,
    }
}

fn current_value<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    if doc.tag_name(node) == "input" && input_type(doc, node) == "checkbox" {
        return if doc.checked(node) { "checked" } else { "unchecked" }.to_string();
    }
    doc.value(node).unwrap_or_default()
}

/// Visible caption of a form field: aria-label, then `<label for>`, then an
/// enclosing `<label>`, then the placeholder. Empty falls back to the described label.
fn field_label<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    let collapse = |s: String| s.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(aria) = doc.attribute(node, "aria-label").filter(|a| !a.trim().is_empty()) {
        return collapse(aria);
    }
    if let Some(id) = doc.attribute(node, "id").filter(|id| !id.trim().is_empty()) {
        let selector = format!("label[for={}]", quote_attribute_value(&id));
        if let Ok(labels) = doc.query_selector_all(&selector)
            && let Some(label) = labels.first()
        {
            return collapse(doc.text_content(*label));
        }
    }
    if let Some(parent) = doc.parent(node)
        && let Ok(Some(label)) = doc.closest(parent, "label")
    {
        return collapse(doc.text_content(label));
    }
    doc.attribute(node, "placeholder")
        .map(collapse)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;

    #[test]
    fn test_field_label_sources() {
        let mut doc = MemoryDocument::new("https://example.com/");
        let body = doc.body_id();
        let label = doc.element(body, "label", &[("for", "card")]);
        doc.text_node(label, "Card  number");
        let card = doc.element(body, "input", &[("id", "card")]);
        let wrap = doc.element(body, "label", &[]);
        doc.text_node(wrap, "Nickname");
        let nick = doc.element(wrap, "input", &[]);
        let bare = doc.element(body, "input", &[("placeholder", "Search")]);

        assert_eq!(field_label(&doc, card), "Card number");
        assert!(field_label(&doc, nick).starts_with("Nickname"));
        assert_eq!(field_label(&doc, bare), "Search");
    }
}
