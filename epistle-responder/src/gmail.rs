//! Gmail REST implementation of the mailbox seam.
//!
//! Reduced to the two operations the pipeline needs: list unread threads
//! (with message bodies flattened to plain text) and save a draft reply on
//! a thread. Authentication is a bearer access token; obtaining and
//! refreshing it is outside this crate.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{MailError, MailResult};
use crate::mailbox::Mailbox;
use crate::models::{DraftReply, EmailMessage, EmailThread};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const LIST_QUERY: &str = "is:unread";
const LIST_MAX_RESULTS: u32 = 50;

#[derive(Debug, Clone)]
pub struct GmailMailbox {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GmailMailbox {
    pub fn new(access_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> MailResult<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MailError::Mailbox(format!(
                "gmail request failed: {status} {text}"
            )));
        }
        Ok(response.json().await?)
    }

    async fn fetch_thread(&self, thread_id: &str) -> MailResult<Option<EmailThread>> {
        let url = format!("{}/threads/{}?format=full", self.base_url, thread_id);
        let thread: GmailThread = self.get_json(&url).await?;

        let mut messages = Vec::new();
        let mut subject = String::new();
        let mut sender = String::new();
        for message in &thread.messages {
            let Some(payload) = &message.payload else {
                continue;
            };
            let from = header_value(payload, "From").unwrap_or_default();
            if sender.is_empty() {
                sender = from.clone();
            }
            if subject.is_empty()
                && let Some(value) = header_value(payload, "Subject")
            {
                subject = value;
            }
            let Some(body) = extract_text(payload) else {
                debug!("thread {}: message without readable body", thread_id);
                continue;
            };
            messages.push(EmailMessage { sender: from, body });
        }

        if messages.is_empty() {
            return Ok(None);
        }

        Ok(Some(EmailThread {
            id: thread.id,
            subject,
            sender,
            messages,
        }))
    }
}

#[async_trait::async_trait]
impl Mailbox for GmailMailbox {
    async fn list_new_threads(&self) -> MailResult<Vec<EmailThread>> {
        let url = format!(
            "{}/threads?q={}&maxResults={}",
            self.base_url, LIST_QUERY, LIST_MAX_RESULTS
        );
        let listing: ThreadList = self.get_json(&url).await?;

        let mut threads = Vec::new();
        for entry in listing.threads.unwrap_or_default() {
            match self.fetch_thread(&entry.id).await {
                Ok(Some(thread)) => threads.push(thread),
                Ok(None) => {}
                Err(err) => {
                    // One malformed thread must not sink the whole poll.
                    tracing::warn!("skipping thread {}: {err}", entry.id);
                }
            }
        }
        Ok(threads)
    }

    async fn save_draft(&self, thread_id: &str, draft: &DraftReply) -> MailResult<()> {
        let mime = format!(
            "Content-Type: text/html; charset=\"UTF-8\"\r\nMIME-Version: 1.0\r\n\r\n{}",
            draft.html_body
        );
        let body = DraftRequest {
            message: DraftMessage {
                thread_id: thread_id.to_string(),
                raw: URL_SAFE.encode(mime.as_bytes()),
            },
        };

        let url = format!("{}/drafts", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MailError::Mailbox(format!(
                "gmail draft save failed: {status} {text}"
            )));
        }
        Ok(())
    }
}

fn header_value(payload: &GmailPayload, name: &str) -> Option<String> {
    payload
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.clone())
}

/// Flatten a message payload to plain text, preferring a text/plain part
/// and falling back to converted text/html.
fn extract_text(payload: &GmailPayload) -> Option<String> {
    find_part(payload, "text/plain")
        .or_else(|| find_part(payload, "text/html").map(|html| html_to_text(&html)))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn find_part(payload: &GmailPayload, mime_type: &str) -> Option<String> {
    if payload.mime_type.as_deref() == Some(mime_type)
        && let Some(body) = &payload.body
        && let Some(data) = &body.data
    {
        return decode_body(data);
    }
    for part in payload.parts.as_deref().unwrap_or_default() {
        if let Some(text) = find_part(part, mime_type) {
            return Some(text);
        }
    }
    None
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    String::from_utf8(bytes).ok()
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80)
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Option<Vec<ThreadRef>>,
}

#[derive(Debug, Deserialize)]
struct ThreadRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GmailThread {
    id: String,
    #[serde(default)]
    messages: Vec<GmailMessage>,
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    payload: Option<GmailPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPayload {
    #[serde(default)]
    headers: Vec<GmailHeader>,
    mime_type: Option<String>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPayload>>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct DraftRequest {
    message: DraftMessage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftMessage {
    thread_id: String,
    raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(mime: &str, text: &str) -> GmailPayload {
        GmailPayload {
            headers: Vec::new(),
            mime_type: Some(mime.to_string()),
            body: Some(GmailBody {
                data: Some(URL_SAFE.encode(text.as_bytes())),
            }),
            parts: None,
        }
    }

    #[test]
    fn prefers_plain_text_part() {
        let multipart = GmailPayload {
            headers: Vec::new(),
            mime_type: Some("multipart/alternative".to_string()),
            body: None,
            parts: Some(vec![
                payload("text/html", "<p>hello <b>there</b></p>"),
                payload("text/plain", "hello there"),
            ]),
        };
        assert_eq!(extract_text(&multipart).as_deref(), Some("hello there"));
    }

    #[test]
    fn falls_back_to_converted_html() {
        let html_only = payload("text/html", "<p>hello <b>there</b></p>");
        let text = extract_text(&html_only).expect("text");
        assert!(text.contains("hello"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn unreadable_body_is_none() {
        let empty = GmailPayload {
            headers: Vec::new(),
            mime_type: Some("text/plain".to_string()),
            body: None,
            parts: None,
        };
        assert!(extract_text(&empty).is_none());
    }
}
