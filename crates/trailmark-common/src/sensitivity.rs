//! Sensitive-field classification.
//!
//! The recorder consumes a classifier; it never decides on its own what counts as
//! sensitive. [`KeywordClassifier`] is the bundled default.

use crate::config::SecurityConfig;

/// Placeholder recorded instead of a sensitive value.
pub const MASKED_VALUE: &str = "••••••••";

/// What a classifier gets to see about a form field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub tag_name: String,
    pub input_type: Option<String>,
    pub name: Option<String>,
    pub id: Option<String>,
    pub label: String,
    pub autocomplete: Option<String>,
}

pub trait SensitivityClassifier: Send + Sync {
    fn is_sensitive(&self, field: &FieldDescriptor) -> bool;

    fn mask(&self, _value: &str) -> String {
        MASKED_VALUE.to_string()
    }
}

/// Flags password inputs and fields whose name, id, label or autocomplete hint
/// contains one of the configured keywords.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            keywords: config
                .sensitive_fields
                .iter()
                .map(|k| normalize(k))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    fn matches_keyword(&self, text: &str) -> bool {
        let text = normalize(text);
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl SensitivityClassifier for KeywordClassifier {
    fn is_sensitive(&self, field: &FieldDescriptor) -> bool {
        if field.input_type.as_deref() == Some("password") {
            return true;
        }
        [
            field.name.as_deref(),
            field.id.as_deref(),
            field.autocomplete.as_deref(),
            Some(field.label.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|text| self.matches_keyword(text))
    }
}

// "Card Number", "card-number" and "card_number" all compare equal.
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(input_type: &str, name: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor {
            tag_name: "input".into(),
            input_type: Some(input_type.into()),
            name: Some(name.into()),
            label: label.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_password_type_is_sensitive() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_sensitive(&field("password", "pw", "")));
    }

    #[test]
    fn test_keyword_match_across_separators() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_sensitive(&field("text", "", "Card Number")));
        assert!(classifier.is_sensitive(&field("text", "user-token", "")));
        assert!(!classifier.is_sensitive(&field("email", "email", "Email address")));
    }

    #[test]
    fn test_mask_is_fixed_placeholder() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.mask("hunter2"), MASKED_VALUE);
        assert_eq!(classifier.mask(""), MASKED_VALUE);
    }
}
