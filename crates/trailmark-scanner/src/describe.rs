//! Human-readable element labels and element snapshots.

use crate::dom::{Document, NodeId, NodeKind};
use crate::selector::synthesize_selector;
use trailmark_common::model::{ElementInfo, truncate_label};

/// Input types whose `value` is their visible caption.
const BUTTON_INPUT_TYPES: &[&str] = &["submit", "button", "reset"];

/// Input types that show a placeholder.
const TEXT_INPUT_TYPES: &[&str] = &["text", "email", "password", "search", "tel", "url", "number"];

/// Descendant tags whose text is worth reading when the element has no own text.
const TEXT_BEARING_TAGS: &[&str] = &[
    "span", "strong", "b", "em", "i", "label", "p", "div", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Class-name fragments marking icon or screen-reader-only content.
const SKIPPED_CLASS_MARKERS: &[&str] = &[
    "icon",
    "sr-only",
    "visually-hidden",
    "visuallyhidden",
    "screen-reader",
    "screenreader",
    "a11y-hidden",
];

/// How far below the element the shallow text scan reaches.
const SHALLOW_TEXT_DEPTH: usize = 2;

/// Extract a label for `node`. Empty when nothing qualifies.
pub fn describe_element<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    let tag = doc.tag_name(node);

    let candidates = [
        doc.attribute(node, "aria-label"),
        doc.attribute(node, "title"),
        input_caption(doc, node, &tag),
        (tag == "img").then(|| doc.attribute(node, "alt")).flatten(),
        Some(direct_text(doc, node)),
        Some(shallow_descendant_text(doc, node)),
        Some(collapse_whitespace(&doc.text_content(node))),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(|c| truncate_label(&c))
        .find(|c| !c.is_empty())
        .unwrap_or_default()
}

fn input_caption<D: Document + ?Sized>(doc: &D, node: NodeId, tag: &str) -> Option<String> {
    if tag != "input" {
        return None;
    }
    let input_type = input_type(doc, node);
    if BUTTON_INPUT_TYPES.contains(&input_type.as_str()) {
        doc.value(node).or_else(|| doc.attribute(node, "value"))
    } else if TEXT_INPUT_TYPES.contains(&input_type.as_str()) {
        doc.attribute(node, "placeholder")
    } else {
        None
    }
}

/// Lowercased `type` attribute of an input, defaulting to `text`.
pub fn input_type<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    doc.attribute(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

fn direct_text<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    let text: Vec<String> = doc
        .children(node)
        .into_iter()
        .filter(|c| doc.kind(*c) == NodeKind::Text)
        .filter_map(|c| doc.text(c))
        .collect();
    collapse_whitespace(&text.join(" "))
}

fn shallow_descendant_text<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    let mut parts = Vec::new();
    collect_shallow_text(doc, node, 1, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn collect_shallow_text<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    depth: usize,
    parts: &mut Vec<String>,
) {
    if depth > SHALLOW_TEXT_DEPTH {
        return;
    }
    for child in doc.element_children(node) {
        if is_skipped(doc, child) {
            continue;
        }
        if TEXT_BEARING_TAGS.contains(&doc.tag_name(child).as_str()) {
            let own = direct_text(doc, child);
            if !own.is_empty() {
                parts.push(own);
            }
        }
        collect_shallow_text(doc, child, depth + 1, parts);
    }
}

fn is_skipped<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    if doc.is_hidden(node) || doc.attribute(node, "aria-hidden").as_deref() == Some("true") {
        return true;
    }
    let class = doc.attribute(node, "class").unwrap_or_default().to_lowercase();
    SKIPPED_CLASS_MARKERS.iter().any(|m| class.contains(m))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Snapshot `node` for an interaction record.
pub fn element_info<D: Document + ?Sized>(doc: &D, node: NodeId) -> ElementInfo {
    let tag_name = doc.tag_name(node);
    let non_empty = |name: &str| doc.attribute(node, name).filter(|v| !v.trim().is_empty());

    ElementInfo {
        text: describe_element(doc, node),
        selector: synthesize_selector(doc, node),
        input_type: (tag_name == "input").then(|| input_type(doc, node)),
        name: non_empty("name"),
        id: non_empty("id"),
        class_name: non_empty("class").map(|c| truncate_label(&collapse_whitespace(&c))),
        aria_label: non_empty("aria-label"),
        tag_name,
    }
}
