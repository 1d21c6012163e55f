//! Thread categorization against the closed taxonomy.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use epistle_core::config::{CategoryLabel, Taxonomy};

use crate::errors::MailResult;
use crate::models::EmailThread;
use crate::providers::Provider;

const SYSTEM_PROMPT: &str = "You label email threads for an auto-responder. \
Respond with a JSON array of label strings and nothing else. \
Only use labels from the allowed list; when none applies, respond with [].";

const MAX_BODY_CHARS: usize = 2000;

pub struct Categorizer {
    provider: Arc<dyn Provider>,
    taxonomy: Taxonomy,
}

impl Categorizer {
    pub fn new(provider: Arc<dyn Provider>, taxonomy: Taxonomy) -> Self {
        Self { provider, taxonomy }
    }

    /// Classify a thread into zero or more taxonomy labels.
    ///
    /// Labels outside the configured set are discarded with a warning; they
    /// never reach the caller. A provider failure is returned as an error so
    /// the caller can decide what the thread is still eligible for.
    pub async fn categorize(&self, thread: &EmailThread) -> MailResult<BTreeSet<CategoryLabel>> {
        let prompt = self.build_prompt(thread);
        let raw = self.provider.send_message(SYSTEM_PROMPT, &prompt).await?;
        Ok(self.parse_labels(&raw))
    }

    fn build_prompt(&self, thread: &EmailThread) -> String {
        let body = thread
            .latest_message()
            .map(|message| truncate_chars(&message.body, MAX_BODY_CHARS))
            .unwrap_or_default();

        format!(
            "Allowed labels: {labels}\n\nFrom: {sender}\nSubject: {subject}\n\n{body}",
            labels = serde_json::to_string(self.taxonomy.labels()).unwrap_or_default(),
            sender = thread.sender,
            subject = thread.subject,
        )
    }

    fn parse_labels(&self, raw: &str) -> BTreeSet<CategoryLabel> {
        let Some(candidates) = extract_json_array(raw) else {
            warn!("categorizer returned no parseable label array: {raw:?}");
            return BTreeSet::new();
        };

        let mut labels = BTreeSet::new();
        for candidate in candidates {
            match self.taxonomy.resolve(&candidate) {
                Some(label) => {
                    labels.insert(label);
                }
                None => warn!("discarding label outside the taxonomy: {candidate:?}"),
            }
        }
        labels
    }
}

/// Pull the first JSON string array out of a model response, tolerating
/// prose or code fences around it.
fn extract_json_array(raw: &str) -> Option<Vec<String>> {
    let start = raw.find('[')?;
    let end = raw[start..].find(']')? + start;
    serde_json::from_str(&raw[start..=end]).ok()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;

    struct FixedProvider(String);

    #[async_trait::async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }
        fn model(&self) -> &str {
            "fixed"
        }
        async fn send_message(&self, _: &str, _: &str) -> Result<String, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn thread() -> EmailThread {
        EmailThread {
            id: "t1".to_string(),
            subject: "What does Tier A cost?".to_string(),
            sender: "alice@example.com".to_string(),
            messages: vec![crate::models::EmailMessage {
                sender: "alice@example.com".to_string(),
                body: "Hi, what does Tier A cost?".to_string(),
            }],
        }
    }

    fn categorizer(response: &str) -> Categorizer {
        Categorizer::new(
            Arc::new(FixedProvider(response.to_string())),
            Taxonomy::new(vec!["QUESTION".to_string(), "SPAM".to_string()]),
        )
    }

    #[tokio::test]
    async fn labels_outside_the_taxonomy_are_discarded() {
        let labels = categorizer(r#"["QUESTION", "URGENT", "question"]"#)
            .categorize(&thread())
            .await
            .unwrap();
        assert_eq!(labels.len(), 1);
        assert!(labels.iter().all(|label| label.as_str() == "QUESTION"));
    }

    #[tokio::test]
    async fn fenced_output_still_parses() {
        let labels = categorizer("Here you go:\n```json\n[\"SPAM\"]\n```")
            .categorize(&thread())
            .await
            .unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_output_yields_no_labels() {
        let labels = categorizer("definitely a question")
            .categorize(&thread())
            .await
            .unwrap();
        assert!(labels.is_empty());
    }
}
