//! Persisted set of already-processed thread ids.
//!
//! Keeping this explicit and injectable (instead of provider-side state)
//! lets the poller guarantee at-most-once delivery per run lifetime and be
//! tested without a real mailbox.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::MailResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeenThreads {
    #[serde(default)]
    ids: HashSet<String>,
}

impl SeenThreads {
    /// Load the state file, or start empty if it does not exist yet.
    pub fn load(path: &Path) -> MailResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save(&self, path: &Path) -> MailResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string(self)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Mark an id as seen. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
