//! The closed category taxonomy for email triage.
//!
//! Labels are configured, not free-form: a `CategoryLabel` can only be
//! obtained by resolving a raw string against the `Taxonomy`, so anything
//! outside the configured set is unrepresentable downstream.

use serde::{Deserialize, Serialize};

/// A label from the configured taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryLabel(String);

impl CategoryLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of labels email threads may be classified into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    labels: Vec<String>,
}

impl Taxonomy {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// All configured labels, in configuration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Resolve a raw string to a configured label (case-insensitive,
    /// whitespace-trimmed). Returns `None` for anything outside the set.
    pub fn resolve(&self, raw: &str) -> Option<CategoryLabel> {
        let needle = raw.trim();
        self.labels
            .iter()
            .find(|label| label.eq_ignore_ascii_case(needle))
            .map(|label| CategoryLabel(label.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec!["QUESTION".to_string(), "SPAM".to_string()])
    }

    #[test]
    fn resolves_case_insensitively_to_canonical_form() {
        let label = taxonomy().resolve(" question ").expect("label");
        assert_eq!(label.as_str(), "QUESTION");
    }

    #[test]
    fn rejects_labels_outside_the_set() {
        assert!(taxonomy().resolve("URGENT").is_none());
        assert!(taxonomy().resolve("").is_none());
    }
}
