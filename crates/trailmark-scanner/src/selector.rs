//! Selector synthesis.
//!
//! Produces a selector that matches exactly one element now and is likely to keep
//! matching it when the same markup is served again. Tiers are tried in order and
//! the first candidate that resolves to exactly the target wins:
//!
//! 1. `#id`, when the id is document-unique
//! 2. `[attr="value"]` over [`STABLE_ATTRIBUTES`]
//! 3. `tag.class`, then `tag.class1.class2…`, using stable classes only
//! 4. a child path anchored at the nearest ancestor with a unique id
//! 5. a child path from `body` down

use crate::dom::query::nth_of_type;
use crate::dom::{Document, NodeId};
use lazy_static::lazy_static;
use regex::Regex;

/// Attributes that signal a deliberately stable hook, in priority order.
pub const STABLE_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test-id",
    "data-test",
    "data-cy",
    "data-qa",
    "name",
    "aria-label",
    "role",
];

lazy_static! {
    static ref UNSTABLE_CLASS_PATTERNS: Vec<Regex> = [
        // CSS-in-JS generated names: emotion, styled-components, styled-jsx, JSS, MUI makeStyles
        r"^css-[a-z0-9]+",
        r"^sc-[a-zA-Z0-9]+",
        r"^jsx-\d+",
        r"^emotion-",
        r"^jss\d+",
        r"^makeStyles-",
        r"^Mui[A-Za-z]+-root-\d+",
        // CSS-module hashes: Button_primary__3xYz1, styles__a1b2c
        r"__[a-zA-Z0-9_-]{5,}$",
        r"_[a-f0-9]{5,}$",
        // Minified names: a1, xy12
        r"^[a-zA-Z]{1,2}\d+$",
        // BEM modifiers and state classes
        r"--",
        r"^(is|has)-",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();

    // Only counts when letters and digits are mixed, so plain words stay stable.
    static ref HASH_LIKE: Regex = Regex::new(r"^[a-zA-Z0-9]{8,}$").unwrap();
    static ref MIXED_ALNUM: Regex = Regex::new(r"[0-9].*[a-zA-Z]|[a-zA-Z].*[0-9]").unwrap();
}

/// Whether a class name looks hand-written rather than generated.
pub fn is_stable_class(class: &str) -> bool {
    if class.is_empty() {
        return false;
    }
    if HASH_LIKE.is_match(class) && MIXED_ALNUM.is_match(class) {
        return false;
    }
    !UNSTABLE_CLASS_PATTERNS.iter().any(|re| re.is_match(class))
}

/// Stable classes of `node`, in attribute order, deduplicated.
pub fn stable_classes<D: Document + ?Sized>(doc: &D, node: NodeId) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for class in doc.class_list(node) {
        if is_stable_class(&class) && !out.contains(&class) {
            out.push(class);
        }
    }
    out
}

/// Serialize `value` as a CSS identifier (CSSOM `CSS.escape`).
pub fn css_escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1F).contains(&code)
            || code == 0x7F
            || (i == 0 && c.is_ascii_digit())
            || (i == 1 && c.is_ascii_digit() && chars[0] == '-')
        {
            out.push_str(&format!("\\{:x} ", code));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Quote `value` as a CSS string for use inside `[attr="…"]`.
pub fn quote_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// True when `selector` resolves to exactly `node`. Syntax errors count as "not unique".
pub fn is_unique<D: Document + ?Sized>(doc: &D, selector: &str, node: NodeId) -> bool {
    match doc.query_selector_all(selector) {
        Ok(found) => found.len() == 1 && found[0] == node,
        Err(e) => {
            tracing::debug!("selector rejected during uniqueness check: {}", e);
            false
        }
    }
}

/// Synthesize a unique, durable selector for `node`. Always returns a selector.
pub fn synthesize_selector<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    if let Some(selector) = id_selector(doc, node) {
        return selector;
    }
    if let Some(selector) = attribute_selector(doc, node) {
        return selector;
    }
    if let Some(selector) = class_selector(doc, node) {
        return selector;
    }
    if let Some(selector) = anchored_path(doc, node) {
        return selector;
    }
    absolute_path(doc, node)
}

fn id_selector<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    let id = doc.attribute(node, "id").filter(|id| !id.trim().is_empty())?;
    let selector = format!("#{}", css_escape(&id));
    is_unique(doc, &selector, node).then_some(selector)
}

fn attribute_selector<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    STABLE_ATTRIBUTES.iter().find_map(|attr| {
        let value = doc.attribute(node, attr).filter(|v| !v.trim().is_empty())?;
        let selector = format!("[{}={}]", attr, quote_attribute_value(&value));
        is_unique(doc, &selector, node).then_some(selector)
    })
}

fn class_selector<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    let classes = stable_classes(doc, node);
    if classes.is_empty() {
        return None;
    }
    let tag = css_escape(&doc.tag_name(node));
    for class in &classes {
        let selector = format!("{}.{}", tag, css_escape(class));
        if is_unique(doc, &selector, node) {
            return Some(selector);
        }
    }
    if classes.len() > 1 {
        let selector = format!("{}{}", tag, class_suffix(&classes));
        if is_unique(doc, &selector, node) {
            return Some(selector);
        }
    }
    None
}

fn anchored_path<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    let mut segments = vec![path_segment(doc, node)];
    let mut current = doc.parent(node);
    while let Some(ancestor) = current {
        if ancestor == doc.root() {
            return None;
        }
        if let Some(anchor) = id_selector(doc, ancestor) {
            segments.push(anchor);
            segments.reverse();
            let selector = segments.join(" > ");
            return is_unique(doc, &selector, node).then_some(selector);
        }
        segments.push(path_segment(doc, ancestor));
        current = doc.parent(ancestor);
    }
    None
}

fn absolute_path<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    if node == doc.root() {
        return doc.tag_name(node);
    }
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if n == doc.root() {
            break;
        }
        segments.push(path_segment(doc, n));
        current = doc.parent(n);
    }
    segments.reverse();
    segments.join(" > ")
}

/// Selector for one path step, unique among the node's element siblings.
fn path_segment<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    let tag = doc.tag_name(node);
    let escaped_tag = css_escape(&tag);
    let Some(parent) = doc.parent(node) else {
        return escaped_tag;
    };
    if matches!(tag.as_str(), "body" | "head") {
        return escaped_tag;
    }

    let same_tag_siblings: Vec<NodeId> = doc
        .element_children(parent)
        .into_iter()
        .filter(|s| *s != node && doc.tag_name(*s) == tag)
        .collect();

    let classes = stable_classes(doc, node);
    let shares = |set: &[String]| {
        same_tag_siblings.iter().any(|s| {
            let sibling_classes = doc.class_list(*s);
            set.iter().all(|c| sibling_classes.contains(c))
        })
    };

    for class in &classes {
        if !shares(std::slice::from_ref(class)) {
            return format!("{}.{}", escaped_tag, css_escape(class));
        }
    }
    if classes.len() > 1 && !shares(&classes) {
        return format!("{}{}", escaped_tag, class_suffix(&classes));
    }
    format!("{}:nth-of-type({})", escaped_tag, nth_of_type(doc, node))
}

fn class_suffix(classes: &[String]) -> String {
    classes.iter().map(|c| format!(".{}", css_escape(c))).collect()
}
