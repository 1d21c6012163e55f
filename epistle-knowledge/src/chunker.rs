//! Deterministic document chunking.
//!
//! A document is split into fixed-size character windows with a fixed
//! overlap between consecutive windows. Identity is positional: the same
//! input always yields the same `(ordinal, content, hash)` sequence, which
//! is what makes index upserts true replacements.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub ordinal: usize,
    pub content: String,
    pub content_hash: String,
}

/// A document body with its front matter stripped and its provenance
/// resolved.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub body: String,
    /// Human-readable source anchor: the front matter `source:` value when
    /// present, otherwise the first URL appearing in the body.
    pub source_url: Option<String>,
}

pub fn prepare_document(raw: &str) -> PreparedDocument {
    let (front, body) = split_front_matter(raw);
    let source_url = front
        .as_deref()
        .and_then(front_matter_source)
        .or_else(|| first_url(&body));
    PreparedDocument { body, source_url }
}

pub fn chunk_text(input: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let chars: Vec<char> = input.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let window = chunk_chars.max(1);
    let overlap = overlap_chars.min(window - 1);
    let step = window - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(chars.len());
        let content: String = chars[start..end].iter().collect();
        let content = content.trim().to_string();
        if !content.is_empty() {
            let content_hash = compute_hash(&content);
            chunks.push(Chunk {
                ordinal: chunks.len(),
                content,
                content_hash,
            });
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Split a leading `---` fenced front matter block from the body.
/// Documents without a fence are returned unchanged.
fn split_front_matter(raw: &str) -> (Option<String>, String) {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with("---") {
        return (None, raw.to_string());
    }

    let mut lines = trimmed.lines();
    let Some(first) = lines.next() else {
        return (None, raw.to_string());
    };
    if first.trim() != "---" {
        return (None, raw.to_string());
    }

    let mut front = Vec::new();
    let mut body = Vec::new();
    let mut in_front = true;
    for line in lines {
        if in_front && line.trim() == "---" {
            in_front = false;
            continue;
        }
        if in_front {
            front.push(line);
        } else {
            body.push(line);
        }
    }

    if in_front {
        // Unterminated fence: treat the whole document as body.
        return (None, raw.to_string());
    }

    (Some(front.join("\n")), body.join("\n"))
}

fn front_matter_source(front: &str) -> Option<String> {
    for line in front.lines() {
        let Some(value) = line.trim().strip_prefix("source:") else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

fn first_url(text: &str) -> Option<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let re = URL_RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s)\]>"']+"#).expect("url regex")
    });
    re.find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}
