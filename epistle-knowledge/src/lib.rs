//! Vault synchronization and retrieval subsystem for epistle.

pub mod chunker;
pub mod embeddings;
pub mod errors;
pub mod models;
pub mod paths;
pub mod search;
pub mod store;
pub mod sync;
pub mod watcher;

pub use epistle_core::config::{EmbeddingSettings, SearchDefaults, VaultSettings};

pub use embeddings::{EmbeddingProvider, OllamaEmbedder};
pub use errors::{KnowledgeError, KnowledgeResult};
pub use models::{RetrievedChunk, VaultChange};
pub use search::Retriever;
pub use store::KnowledgeStore;
pub use sync::VaultSynchronizer;
