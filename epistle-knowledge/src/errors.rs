use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("missing data directory")]
    MissingDataDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("sqlite-vec initialization error: {0}")]
    SqliteVec(String),
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
