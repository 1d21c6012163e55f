use serde::{Deserialize, Serialize};

/// One message inside a thread, already reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub sender: String,
    pub body: String,
}

/// An email thread as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailThread {
    pub id: String,
    pub subject: String,
    pub sender: String,
    /// Messages in mailbox order, oldest first.
    pub messages: Vec<EmailMessage>,
}

impl EmailThread {
    pub fn latest_message(&self) -> Option<&EmailMessage> {
        self.messages.last()
    }
}

/// The outcome of drafting: either a grounded reply or an explicit refusal
/// to answer. Abstention is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftResponse {
    Reply(DraftReply),
    Abstain,
}

impl DraftResponse {
    pub fn is_abstain(&self) -> bool {
        matches!(self, Self::Abstain)
    }
}

/// A drafted HTML reply with its provenance footnotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftReply {
    /// Body restricted to simple inline HTML, footnote list included.
    pub html_body: String,
    /// Source URLs backing the answer, deduplicated, best hit first.
    pub footnotes: Vec<String>,
}
