//! Vault synchronization: keeps the vector index equal to what chunking the
//! current file tree would produce.
//!
//! `reconcile` applies one change notification; `full_resync` rebuilds from
//! the tree itself and is the consistency backstop for dropped or duplicated
//! notifications. Within a document, new chunks are upserted before stale
//! ordinals are trimmed, so a reader never observes less than the old state
//! mid-update.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use epistle_core::config::{EmbeddingSettings, VaultSettings};

use crate::chunker::{Chunk, chunk_text, compute_hash, prepare_document};
use crate::embeddings::EmbeddingProvider;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::VaultChange;
use crate::paths::vault_root;
use crate::store::{ChunkRecord, KnowledgeStore};

#[derive(Clone)]
pub struct VaultSynchronizer {
    vault: VaultSettings,
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_batch: usize,
    expected_dim: Option<usize>,
}

impl VaultSynchronizer {
    pub fn new(
        vault: VaultSettings,
        embedding: &EmbeddingSettings,
        store: KnowledgeStore,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            vault,
            store,
            embedder,
            embedding_batch: embedding.batch.max(1),
            expected_dim: embedding.dim,
        }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn vault_settings(&self) -> &VaultSettings {
        &self.vault
    }

    pub fn reconcile_seconds(&self) -> u64 {
        self.vault.reconcile_seconds
    }

    /// Apply a single change notification.
    pub async fn reconcile(&self, change: VaultChange) -> KnowledgeResult<()> {
        match change {
            VaultChange::Created(path) | VaultChange::Modified(path) => {
                self.index_document(&path).await
            }
            VaultChange::Deleted(path) => self.remove_document(&path).await,
            VaultChange::Renamed { from, to } => {
                self.remove_document(&from).await?;
                self.index_document(&to).await
            }
        }
    }

    /// Walk the whole tree, index what changed, and drop index entries whose
    /// file is gone. Per-document failures are logged and left for the next
    /// pass; they never abort the sweep.
    pub async fn full_resync(&self) -> KnowledgeResult<()> {
        let root = vault_root(&self.vault)?;
        let mut on_disk: HashSet<String> = HashSet::new();
        let mut failures = 0usize;

        if root.exists() {
            for entry in WalkDir::new(&root).into_iter().filter_map(|entry| entry.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().and_then(|v| v.to_str()) != Some("md") {
                    continue;
                }
                // Hidden-ness is judged below the root only, so a dotted
                // temp directory holding the vault does not hide everything.
                if path
                    .strip_prefix(&root)
                    .map(is_hidden_path)
                    .unwrap_or(false)
                {
                    continue;
                }

                on_disk.insert(path_key(path)?);
                if let Err(err) = self.index_document(path).await {
                    warn!("resync failed for {}: {err}", path.display());
                    failures += 1;
                }
            }
        }

        let mut removed = 0usize;
        for indexed in self.store.indexed_paths().await? {
            if !on_disk.contains(&indexed) {
                self.store.delete_document(&indexed).await?;
                removed += 1;
            }
        }

        info!(
            "full resync done: {} documents on disk, {} removed from index, {} failures",
            on_disk.len(),
            removed,
            failures
        );
        Ok(())
    }

    /// Chunk, embed and upsert one document, then trim ordinals that no
    /// longer exist. Unreadable or too-short files are skipped, and a file
    /// that shrank below the indexing threshold is removed from the index.
    async fn index_document(&self, path: &Path) -> KnowledgeResult<()> {
        if path.extension().and_then(|v| v.to_str()) != Some("md") {
            return Ok(());
        }

        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // The file disappeared between the notification and now.
                return self.remove_document(path).await;
            }
            Err(err) => {
                warn!("skipping unreadable file {}: {err}", path.display());
                return Ok(());
            }
        };

        let key = path_key(path)?;

        if raw.trim().chars().count() < self.vault.min_content_chars {
            debug!(
                "content shorter than {} chars, not indexing {}",
                self.vault.min_content_chars,
                path.display()
            );
            return self.store.delete_document(&key).await;
        }

        let content_hash = compute_hash(&raw);
        if self.store.document_hash(&key).await?.as_deref() == Some(content_hash.as_str()) {
            return Ok(());
        }

        let prepared = prepare_document(&raw);
        let chunks = chunk_text(
            &prepared.body,
            self.vault.chunk_chars,
            self.vault.chunk_overlap,
        );
        if chunks.is_empty() {
            return self.store.delete_document(&key).await;
        }

        self.upsert_chunks(&key, prepared.source_url.as_deref(), &chunks)
            .await?;
        self.store.trim_chunks(&key, chunks.len() as i64).await?;
        self.store.record_document(&key, &content_hash).await?;

        debug!("indexed {} ({} chunks)", path.display(), chunks.len());
        Ok(())
    }

    async fn remove_document(&self, path: &Path) -> KnowledgeResult<()> {
        let key = path_key(path)?;
        self.store.delete_document(&key).await?;
        debug!("removed {} from index", path.display());
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        key: &str,
        source_url: Option<&str>,
        chunks: &[Chunk],
    ) -> KnowledgeResult<()> {
        let mut offset = 0;
        while offset < chunks.len() {
            let end = (offset + self.embedding_batch).min(chunks.len());
            let inputs = chunks[offset..end]
                .iter()
                .map(|chunk| chunk.content.clone())
                .collect::<Vec<_>>();

            let embeddings = self.embedder.embed_batch(&inputs).await?;
            if embeddings.len() != inputs.len() {
                return Err(KnowledgeError::Embedding(format!(
                    "embedding batch returned {} vectors for {} inputs",
                    embeddings.len(),
                    inputs.len()
                )));
            }

            for (idx, embedding) in embeddings.into_iter().enumerate() {
                if let Some(expected) = self.expected_dim
                    && expected != embedding.len()
                {
                    return Err(KnowledgeError::EmbeddingDimMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                let chunk = &chunks[offset + idx];
                let record = ChunkRecord {
                    path: key.to_string(),
                    ordinal: chunk.ordinal as i64,
                    content: chunk.content.clone(),
                    content_hash: chunk.content_hash.clone(),
                    source_url: source_url.map(str::to_string),
                };
                self.store.upsert_chunk(&record, &embedding).await?;
            }

            offset = end;
        }

        Ok(())
    }
}

/// Stable string key for a document path.
fn path_key(path: &Path) -> KnowledgeResult<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| KnowledgeError::NonUtf8Path(path.to_path_buf()))
}

fn is_hidden_path(path: &Path) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| name.starts_with('.') && name.len() > 1)
            .unwrap_or(false)
    })
}
