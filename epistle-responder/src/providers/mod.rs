//! Provider trait for abstracting the text-generation backend.

pub mod anthropic;

pub use anthropic::AnthropicClient;

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {message}")]
    Api { message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A text-generation backend. The pipeline only needs single-turn calls:
/// a system prompt plus one user message, text back.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Current model
    fn model(&self) -> &str;

    /// Send a single-turn message and return the response text.
    async fn send_message(&self, system: &str, content: &str) -> Result<String, ProviderError>;
}
