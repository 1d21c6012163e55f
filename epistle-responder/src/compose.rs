//! Retrieval-augmented reply drafting.
//!
//! A reply is only produced when retrieved context can ground it. No
//! context, or context the model judges insufficient, yields the explicit
//! abstention value instead of a fabricated answer.

use std::sync::Arc;

use tracing::debug;

use epistle_core::config::SearchDefaults;
use epistle_knowledge::{RetrievedChunk, Retriever};

use crate::errors::MailResult;
use crate::models::{DraftReply, DraftResponse, EmailThread};
use crate::providers::Provider;

/// Marker the provider is instructed to answer with when the supplied
/// context cannot ground a reply.
pub const INSUFFICIENT_MARKER: &str = "INSUFFICIENT_CONTEXT";

const SYSTEM_PROMPT: &str = "You draft email replies from reference notes. \
Answer only the sender's explicit question; ignore tangential topics in the thread. \
Use only the numbered context excerpts; never invent facts beyond them. \
If the excerpts do not contain the answer, respond with exactly INSUFFICIENT_CONTEXT. \
Format the reply as HTML restricted to simple inline tags (<p>, <b>, <i>, <a>, <ul>, <li>). \
Do not add a greeting or signature.";

pub struct ResponseComposer {
    provider: Arc<dyn Provider>,
    retriever: Arc<Retriever>,
    top_k: usize,
    max_query_chars: usize,
}

impl ResponseComposer {
    pub fn new(
        provider: Arc<dyn Provider>,
        retriever: Arc<Retriever>,
        search: &SearchDefaults,
    ) -> Self {
        Self {
            provider,
            retriever,
            top_k: search.top_k,
            max_query_chars: search.max_query_chars,
        }
    }

    pub async fn compose(&self, thread: &EmailThread) -> MailResult<DraftResponse> {
        let Some(message) = thread.latest_message() else {
            debug!("thread {} has no readable message, abstaining", thread.id);
            return Ok(DraftResponse::Abstain);
        };

        let query = formulate_query(&thread.subject, &message.body, self.max_query_chars);
        let context = self.retriever.retrieve(&query, self.top_k).await?;
        if context.is_empty() {
            debug!("no context retrieved for thread {}, abstaining", thread.id);
            return Ok(DraftResponse::Abstain);
        }

        let prompt = build_prompt(&query, &context);
        let raw = self.provider.send_message(SYSTEM_PROMPT, &prompt).await?;
        let answer = raw.trim();
        if answer.is_empty() || answer.contains(INSUFFICIENT_MARKER) {
            debug!("provider judged context insufficient for thread {}", thread.id);
            return Ok(DraftResponse::Abstain);
        }

        let footnotes = collect_footnotes(&context);
        let html_body = render_body(answer, &footnotes);
        Ok(DraftResponse::Reply(DraftReply {
            html_body,
            footnotes,
        }))
    }
}

/// The retrieval query: subject plus latest body, bounded.
fn formulate_query(subject: &str, body: &str, max_chars: usize) -> String {
    let combined = format!("{}\n{}", subject.trim(), body.trim());
    combined.chars().take(max_chars).collect::<String>().trim().to_string()
}

fn build_prompt(query: &str, context: &[RetrievedChunk]) -> String {
    let mut prompt = format!("Question:\n{query}\n\nContext excerpts:\n");
    for (idx, chunk) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", idx + 1, chunk.content));
    }
    prompt
}

/// Provenance URLs of the retrieved chunks, deduplicated, best hit first.
fn collect_footnotes(context: &[RetrievedChunk]) -> Vec<String> {
    let mut footnotes = Vec::new();
    for chunk in context {
        if let Some(url) = &chunk.source_url
            && !footnotes.contains(url)
        {
            footnotes.push(url.clone());
        }
    }
    footnotes
}

fn render_body(answer: &str, footnotes: &[String]) -> String {
    if footnotes.is_empty() {
        return answer.to_string();
    }
    let mut body = String::from(answer);
    body.push_str("\n<hr/>\n<ol>\n");
    for url in footnotes {
        body.push_str(&format!("<li><a href=\"{url}\">{url}</a></li>\n"));
    }
    body.push_str("</ol>");
    body
}
