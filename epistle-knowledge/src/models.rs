use std::path::PathBuf;

/// A change notification for the vault tree.
///
/// Notifications are hints: they may arrive duplicated or out of order, and
/// the periodic full resync remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultChange {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// A retrieval hit with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub path: String,
    pub source_url: Option<String>,
    /// Relevance score, higher is better.
    pub score: f32,
}
