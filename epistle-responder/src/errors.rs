use crate::providers::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("knowledge error: {0}")]
    Knowledge(#[from] epistle_knowledge::KnowledgeError),
    #[error("mailbox error: {0}")]
    Mailbox(String),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

pub type MailResult<T> = Result<T, MailError>;
