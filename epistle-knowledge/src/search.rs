//! Retrieval over the vector index.

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::errors::KnowledgeResult;
use crate::models::RetrievedChunk;
use crate::store::KnowledgeStore;

#[derive(Clone)]
pub struct Retriever {
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: KnowledgeStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Top-`k` chunks for `query`, best first. `k = 0`, a blank query and an
    /// empty index all yield an empty vec; none of them is an error.
    pub async fn retrieve(&self, query: &str, k: usize) -> KnowledgeResult<Vec<RetrievedChunk>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed_batch(&[query.to_string()]).await?;
        let Some(embedding) = embeddings.first() else {
            return Ok(Vec::new());
        };

        let hits = self.store.query_chunks(embedding, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                content: hit.content,
                path: hit.path,
                source_url: hit.source_url,
                score: 1.0 / (1.0 + hit.distance.max(0.0)),
            })
            .collect())
    }
}
