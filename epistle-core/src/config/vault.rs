//! Vault indexing configuration.
//!
//! Resolved settings for the note vault: where it lives, how documents are
//! chunked, and how often the consistency backstop runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Resolved vault settings (all values filled with defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Root of the watched note tree. Defaults to `<data dir>/vault`.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Override for the index database location.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Target chunk size, in characters.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Character overlap between consecutive chunks of the same document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Documents shorter than this (after trimming) are not indexed.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    /// Interval of the periodic full resync backstop.
    #[serde(default = "default_reconcile_seconds")]
    pub reconcile_seconds: u64,
    /// Override the root data directory for all vault paths.
    /// When set, the vault root and database derive from this root instead
    /// of `EPISTLE_DATA_DIR` / XDG. Primarily for testing.
    #[serde(default)]
    pub data_root_override: Option<PathBuf>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            root: None,
            db_path: None,
            chunk_chars: default_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
            min_content_chars: default_min_content_chars(),
            reconcile_seconds: default_reconcile_seconds(),
            data_root_override: None,
        }
    }
}

fn default_chunk_chars() -> usize {
    1200
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_min_content_chars() -> usize {
    10
}

fn default_reconcile_seconds() -> u64 {
    300
}
