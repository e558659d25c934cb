use super::{Emitter, TEXT_LIKE_INPUT_TYPES, Tracking, is_recorder_ui};
use crate::describe::{element_info, input_type};
use crate::dom::{Document, NodeId};
use trailmark_common::protocol::{ClickEvent, RuntimeMessage};

/// Elements a click on which is worth recording.
pub const INTERACTIVE_SELECTOR: &str = "a, button, input, select, textarea, label, summary, \
    [role=\"button\"], [role=\"link\"], [role=\"checkbox\"], [role=\"radio\"], [role=\"tab\"], \
    [role=\"menuitem\"], [role=\"option\"], [role=\"switch\"], [onclick], [tabindex]";

/// Controls that absorb clicks on interactive content nested inside them.
const ENCLOSING_CONTROL_SELECTOR: &str = "a, button, [role=\"button\"], [role=\"link\"], \
    [role=\"menuitem\"], [role=\"tab\"], [role=\"option\"]";

#[derive(Debug, Default)]
pub struct ClickDetector {
    tracking: Tracking,
}

impl ClickDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, start_epoch: i64, emit: Emitter) {
        self.tracking.start(start_epoch, emit);
    }

    pub fn stop(&mut self) {
        self.tracking.stop();
    }

    pub fn is_active(&self) -> bool {
        self.tracking.is_active()
    }

    /// Handle a click on `target`. Returns the emitted record, if any.
    pub fn on_click<D: Document + ?Sized>(
        &self,
        doc: &D,
        target: NodeId,
        now_ms: i64,
    ) -> Option<ClickEvent> {
        if !self.is_active() {
            return None;
        }
        let effective = resolve_click_target(doc, target)?;
        if is_recorder_ui(doc, effective) {
            return None;
        }

        let event = ClickEvent {
            element: element_info(doc, effective),
            url: doc.url(),
            timestamp: self.tracking.relative(now_ms),
        };
        tracing::debug!(selector = %event.element.selector, "click recorded");
        self.tracking.send(RuntimeMessage::ClickEvent(event.clone()));
        Some(event)
    }
}

/// Resolve the element a click on `target` actually operated.
pub fn resolve_click_target<D: Document + ?Sized>(doc: &D, target: NodeId) -> Option<NodeId> {
    let target = if doc.is_element(target) {
        target
    } else {
        doc.parent(target)?
    };

    if doc.matches(target, INTERACTIVE_SELECTOR).unwrap_or(false) {
        if doc.tag_name(target) == "input"
            && !TEXT_LIKE_INPUT_TYPES.contains(&input_type(doc, target).as_str())
        {
            return Some(target);
        }
        let enclosing = doc
            .parent(target)
            .and_then(|p| doc.closest(p, ENCLOSING_CONTROL_SELECTOR).ok().flatten());
        return Some(enclosing.unwrap_or(target));
    }

    doc.parent(target)
        .and_then(|p| doc.closest(p, INTERACTIVE_SELECTOR).ok().flatten())
}
