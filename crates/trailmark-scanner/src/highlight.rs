use crate::dom::{DocumentMut, NodeId};

/// Attribute marking nodes that belong to the recorder's own UI. Detectors ignore
/// anything inside a subtree carrying it.
pub const RECORDER_UI_ATTRIBUTE: &str = "data-trailmark-ui";

/// Space between the target's box and the outline, in CSS pixels.
pub const HIGHLIGHT_PADDING: f64 = 4.0;

const OVERLAY_STYLES: &[(&str, &str)] = &[
    ("position", "absolute"),
    ("pointer-events", "none"),
    ("z-index", "2147483647"),
    ("border", "3px solid #ff4f4f"),
    ("border-radius", "4px"),
    ("box-shadow", "0 0 0 4px rgba(255, 79, 79, 0.25)"),
    ("box-sizing", "border-box"),
];

/// Single reusable outline overlay per page.
#[derive(Debug, Default)]
pub struct HighlightOverlay {
    node: Option<NodeId>,
}

impl HighlightOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay node, once created.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Outline `target` at its current position and make the overlay visible.
    pub fn show<D: DocumentMut + ?Sized>(&mut self, doc: &mut D, target: NodeId) {
        let overlay = self.ensure(doc);
        let rect = doc.bounding_rect(target);
        let (scroll_x, scroll_y) = doc.scroll_offset();

        doc.set_style(overlay, "top", &px(rect.y + scroll_y - HIGHLIGHT_PADDING));
        doc.set_style(overlay, "left", &px(rect.x + scroll_x - HIGHLIGHT_PADDING));
        doc.set_style(overlay, "width", &px(rect.width + 2.0 * HIGHLIGHT_PADDING));
        doc.set_style(overlay, "height", &px(rect.height + 2.0 * HIGHLIGHT_PADDING));
        doc.set_style(overlay, "display", "block");
    }

    /// Hide the overlay, keeping the node for reuse.
    pub fn hide<D: DocumentMut + ?Sized>(&mut self, doc: &mut D) {
        if let Some(overlay) = self.node {
            doc.set_style(overlay, "display", "none");
        }
    }

    /// Detach the overlay from the document.
    pub fn remove<D: DocumentMut + ?Sized>(&mut self, doc: &mut D) {
        if let Some(overlay) = self.node.take() {
            doc.remove(overlay);
        }
    }

    pub fn is_visible<D: DocumentMut + ?Sized>(&self, doc: &D) -> bool {
        self.node
            .is_some_and(|n| doc.is_connected(n) && doc.style(n, "display").as_deref() == Some("block"))
    }

    fn ensure<D: DocumentMut + ?Sized>(&mut self, doc: &mut D) -> NodeId {
        if let Some(node) = self.node
            && doc.is_connected(node)
        {
            return node;
        }
        let node = doc.create_element("div");
        doc.set_attribute(node, RECORDER_UI_ATTRIBUTE, "highlight");
        doc.set_attribute(node, "aria-hidden", "true");
        for (property, value) in OVERLAY_STYLES {
            doc.set_style(node, property, value);
        }
        let parent = doc.body().unwrap_or_else(|| doc.root());
        doc.append_child(parent, node);
        self.node = Some(node);
        node
    }
}

fn px(value: f64) -> String {
    format!("{}px", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MemoryDocument};

    #[test]
    fn test_hide_keeps_node_and_remove_detaches() {
        let mut doc = MemoryDocument::new("https://example.com/");
        let body = doc.body_id();
        let button = doc.element(body, "button", &[]);
        let mut overlay = HighlightOverlay::new();

        overlay.show(&mut doc, button);
        let node = overlay.node().unwrap();
        assert!(overlay.is_visible(&doc));

        overlay.hide(&mut doc);
        assert!(!overlay.is_visible(&doc));
        assert!(doc.is_connected(node));

        overlay.remove(&mut doc);
        assert!(overlay.node().is_none());
        assert!(!doc.is_connected(node));
        assert!(doc.parent(node).is_none());

        // Removing twice is harmless.
        overlay.remove(&mut doc);
    }
}
