//! Minimal DOM tree adapter.
//!
//! The selector synthesizer, describer, highlight overlay and detectors are written
//! against these traits so they run on any tree that can answer the same questions
//! a browser document can.

pub mod memory;
pub mod query;

pub use memory::MemoryDocument;
pub use query::SelectorSyntaxError;

use serde::{Deserialize, Serialize};

/// Stable handle to a node for the lifetime of its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

/// Border box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

pub trait Document {
    /// The document element (`<html>`).
    fn root(&self) -> NodeId;

    /// Whether `node` names a node of this document. Ids arriving from outside must pass
    /// this before any other lookup.
    fn contains(&self, node: NodeId) -> bool;

    fn body(&self) -> Option<NodeId>;

    fn kind(&self, node: NodeId) -> NodeKind;

    /// Lowercase tag name; empty for text nodes.
    fn tag_name(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Parent element, `None` for the root and for detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes in document order, text nodes included.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Character data of a text node.
    fn text(&self, node: NodeId) -> Option<String>;

    /// Live value of a form control (differs from the `value` attribute once edited).
    fn value(&self, node: NodeId) -> Option<String>;

    fn checked(&self, node: NodeId) -> bool;

    /// Computed `display: none` / `visibility: hidden`, on the node or an ancestor.
    fn is_hidden(&self, node: NodeId) -> bool;

    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Page scroll offset `(x, y)`.
    fn scroll_offset(&self) -> (f64, f64);

    fn url(&self) -> String;

    /// Elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorSyntaxError>;

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorSyntaxError>;

    fn is_element(&self, node: NodeId) -> bool {
        self.kind(node) == NodeKind::Element
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .into_iter()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorSyntaxError> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.is_element(n) && self.matches(n, selector)? {
                return Ok(Some(n));
            }
            current = self.parent(n);
        }
        Ok(None)
    }

    /// Concatenated data of all descendant text nodes.
    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        collect_text(self, node, &mut out);
        out
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn collect_text<D: Document + ?Sized>(doc: &D, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Text => {
            if let Some(t) = doc.text(node) {
                out.push_str(&t);
            }
        }
        NodeKind::Element => {
            for child in doc.children(node) {
                collect_text(doc, child, out);
            }
        }
    }
}

/// Mutation surface needed by the highlight overlay.
pub trait DocumentMut: Document {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: NodeId);

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    fn style(&self, node: NodeId, property: &str) -> Option<String>;

    /// Whether `node` is attached to the document tree.
    fn is_connected(&self, node: NodeId) -> bool;
}
