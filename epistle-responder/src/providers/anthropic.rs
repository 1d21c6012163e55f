//! Anthropic Messages API client.

use epistle_core::retry::{RetryPolicy, retry_with_backoff};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::providers::{Provider, ProviderError};

/// Anthropic API client
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    retry: RetryPolicy,
}

/// Request body for the Messages API
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

/// Response from the Messages API
#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// Content block in the response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            base_url: "https://api.anthropic.com/v1".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(&self, system: &str, content: &str) -> Result<String, ProviderError> {
        let url = format!("{}/messages", self.base_url);
        let request_body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then(|| system.to_string()),
            messages: vec![Message {
                role: "user",
                content: content.to_string(),
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        let messages_response: MessagesResponse = response.json().await?;
        messages_response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or(ProviderError::NoContent)
    }
}

#[async_trait::async_trait]
impl Provider for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn send_message(&self, system: &str, content: &str) -> Result<String, ProviderError> {
        retry_with_backoff(self.retry, "generation request", || {
            self.request_once(system, content)
        })
        .await
    }
}
