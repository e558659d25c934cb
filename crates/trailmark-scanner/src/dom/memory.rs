//! Arena-backed in-memory document.

use super::query::{self, SelectorSyntaxError};
use super::{Document, DocumentMut, NodeId, NodeKind, Rect};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    attributes: Vec<(String, String)>,
    styles: HashMap<String, String>,
    text: Option<String>,
    value: Option<String>,
    checked: bool,
    hidden: bool,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            styles: HashMap::new(),
            text: None,
            value: None,
            checked: false,
            hidden: false,
            rect: Rect::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    fn text(data: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            text: Some(data.to_string()),
            ..Self::element("")
        }
    }
}

/// A document built node by node. Starts out as `<html><body></body></html>`.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    url: String,
    scroll: (f64, f64),
}

impl MemoryDocument {
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: vec![NodeData::element("html")],
            root: NodeId(0),
            body: NodeId(0),
            url: url.into(),
            scroll: (0.0, 0.0),
        };
        let body = doc.create_element("body");
        doc.append_child(doc.root, body);
        doc.body = body;
        doc
    }

    pub fn body_id(&self) -> NodeId {
        self.body
    }

    /// Append a new element under `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(node, name, value);
        }
        if matches!(self.data(node).tag.as_str(), "input" | "textarea" | "select")
            && let Some(value) = self.attribute(node, "value")
        {
            self.data_mut(node).value = Some(value);
        }
        self.append_child(parent, node);
        node
    }

    /// Append a text node under `parent`.
    pub fn text_node(&mut self, parent: NodeId, data: &str) -> NodeId {
        let node = self.push(NodeData::text(data));
        self.append_child(parent, node);
        node
    }

    /// Set the live value of a form control, as typing would.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.data_mut(node).value = Some(value.to_string());
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        self.data_mut(node).checked = checked;
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) {
        self.data_mut(node).hidden = hidden;
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.data_mut(node).rect = rect;
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.data_mut(node).attributes.retain(|(n, _)| n != name);
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0 as usize]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.0 as usize]
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn contains(&self, node: NodeId) -> bool {
        (node.0 as usize) < self.nodes.len()
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.data(node).kind
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.data(node).tag.clone()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.data(node)
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.data(node).children.clone()
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.data(node).text.clone()
    }

    fn value(&self, node: NodeId) -> Option<String> {
        self.data(node).value.clone()
    }

    fn checked(&self, node: NodeId) -> bool {
        self.data(node).checked
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            let data = self.data(n);
            if data.hidden
                || data.styles.get("display").is_some_and(|v| v == "none")
                || data.styles.get("visibility").is_some_and(|v| v == "hidden")
            {
                return true;
            }
            current = data.parent;
        }
        false
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.data(node).rect
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorSyntaxError> {
        Ok(query::parse(selector)?.select_all(self))
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorSyntaxError> {
        Ok(query::parse(selector)?.matches(self, node))
    }
}

impl DocumentMut for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::element(tag))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove(child);
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.data_mut(node).parent.take() {
            self.data_mut(parent).children.retain(|c| *c != node);
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let attributes = &mut self.data_mut(node).attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        self.data_mut(node)
            .styles
            .insert(property.to_string(), value.to_string());
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.data(node).styles.get(property).cloned()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.data(current).parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }
}
