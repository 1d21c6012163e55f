use std::time::Duration;

use epistle_core::config::EmbeddingSettings;
use epistle_core::retry::{RetryPolicy, retry_with_backoff};
use serde::Deserialize;

use crate::errors::{KnowledgeError, KnowledgeResult};

/// Text-to-vector service seam.
///
/// The production implementation talks to an Ollama-compatible endpoint;
/// tests substitute a deterministic in-process implementation.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: self.model.clone(),
            input: inputs.to_vec(),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Embedding(format!(
                "embedding request failed: {status} {text}"
            )));
        }

        let payload: EmbedResponse = response.json().await?;

        if let Some(embeddings) = payload.embeddings {
            return Ok(embeddings);
        }

        if let Some(embedding) = payload.embedding {
            return Ok(vec![embedding]);
        }

        Err(KnowledgeError::Embedding(
            "embedding response missing vectors".to_string(),
        ))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        retry_with_backoff(self.retry, "embedding request", || self.request_once(inputs)).await
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
}
