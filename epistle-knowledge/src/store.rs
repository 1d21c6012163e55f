//! The vector index: sqlite + sqlite-vec behind a small typed API.
//!
//! Chunk identity is `(path, ordinal)`. The `chunks` row carries the text
//! and provenance payload; the `chunk_vec` virtual table carries the
//! embedding under the same rowid, so an upsert replaces both halves of a
//! record instead of appending.

use std::path::Path;
use std::sync::OnceLock;

use chrono::Utc;
use libsqlite3_sys::{SQLITE_OK, sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::errors::{KnowledgeError, KnowledgeResult};

static SQLITE_VEC_INIT_RC: OnceLock<i32> = OnceLock::new();

/// A chunk row ready for the index, embedding not included.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub path: String,
    pub ordinal: i64,
    pub content: String,
    pub content_hash: String,
    pub source_url: Option<String>,
}

/// A nearest-neighbor hit joined with its payload.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub chunk_id: i64,
    pub path: String,
    pub content: String,
    pub source_url: Option<String>,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub async fn open(db_path: &Path, embedding_dim: Option<usize>) -> KnowledgeResult<Self> {
        init_sqlite_vec_once()?;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        ensure_vec_table(&pool, embedding_dim).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a chunk and its embedding under the stable
    /// `(path, ordinal)` key. Returns the chunk rowid.
    pub async fn upsert_chunk(
        &self,
        record: &ChunkRecord,
        embedding: &[f32],
    ) -> KnowledgeResult<i64> {
        sqlx::query(
            r#"INSERT INTO chunks (path, ordinal, content, content_hash, source_url, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(path, ordinal) DO UPDATE SET
                   content=excluded.content,
                   content_hash=excluded.content_hash,
                   source_url=excluded.source_url,
                   updated_at=excluded.updated_at"#,
        )
        .bind(&record.path)
        .bind(record.ordinal)
        .bind(&record.content)
        .bind(&record.content_hash)
        .bind(&record.source_url)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        // The conflict path keeps the existing rowid, so look it up instead
        // of trusting last_insert_rowid.
        let (chunk_id,): (i64,) =
            sqlx::query_as("SELECT id FROM chunks WHERE path = ? AND ordinal = ?")
                .bind(&record.path)
                .bind(record.ordinal)
                .fetch_one(&self.pool)
                .await?;

        ensure_vec_table_dim(&self.pool, embedding.len()).await?;
        let payload = serde_json::to_string(embedding)
            .map_err(|e| KnowledgeError::Embedding(format!("embedding serialize failed: {e}")))?;
        sqlx::query("INSERT OR REPLACE INTO chunk_vec(rowid, embedding) VALUES (?, ?)")
            .bind(chunk_id)
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(chunk_id)
    }

    /// Delete chunks of `path` whose ordinal is `keep` or beyond (the file
    /// shrank and those windows no longer exist).
    pub async fn trim_chunks(&self, path: &str, keep: i64) -> KnowledgeResult<()> {
        let stale: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM chunks WHERE path = ? AND ordinal >= ?")
                .bind(path)
                .bind(keep)
                .fetch_all(&self.pool)
                .await?;
        self.delete_chunk_rows(&stale).await?;
        Ok(())
    }

    /// Remove every record whose source path equals `path`.
    pub async fn delete_document(&self, path: &str) -> KnowledgeResult<()> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM chunks WHERE path = ?")
            .bind(path)
            .fetch_all(&self.pool)
            .await?;
        self.delete_chunk_rows(&ids).await?;
        sqlx::query("DELETE FROM documents WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_chunk_rows(&self, ids: &[(i64,)]) -> KnowledgeResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if vec_table_exists(&self.pool).await? {
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!("DELETE FROM chunk_vec WHERE rowid IN ({})", placeholders);
            let mut query = sqlx::query(&sql);
            for (chunk_id,) in ids {
                query = query.bind(chunk_id);
            }
            query.execute(&self.pool).await?;
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("DELETE FROM chunks WHERE id IN ({})", placeholders);
        let mut query = sqlx::query(&sql);
        for (chunk_id,) in ids {
            query = query.bind(chunk_id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// Record the indexed content hash for a document. Written only after
    /// all of the document's chunks and vectors landed, so a failed pass is
    /// retried by the next full resync.
    pub async fn record_document(&self, path: &str, content_hash: &str) -> KnowledgeResult<()> {
        sqlx::query(
            r#"INSERT INTO documents (path, content_hash, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(path) DO UPDATE SET
                   content_hash=excluded.content_hash,
                   updated_at=excluded.updated_at"#,
        )
        .bind(path)
        .bind(content_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn document_hash(&self, path: &str) -> KnowledgeResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT content_hash FROM documents WHERE path = ? LIMIT 1")
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(hash,)| hash))
    }

    /// Every path currently present in the index.
    pub async fn indexed_paths(&self) -> KnowledgeResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT path FROM documents UNION SELECT DISTINCT path FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(path,)| path).collect())
    }

    pub async fn count_chunks(&self, path: &str) -> KnowledgeResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks WHERE path = ?")
            .bind(path)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Nearest neighbors of `embedding`, ascending distance, at most `k`.
    /// An index with no vector table yet is simply empty.
    pub async fn query_chunks(&self, embedding: &[f32], k: usize) -> KnowledgeResult<Vec<ChunkHit>> {
        if k == 0 || !vec_table_exists(&self.pool).await? {
            return Ok(Vec::new());
        }

        let payload = serde_json::to_string(embedding)
            .map_err(|e| KnowledgeError::Embedding(format!("embedding serialize failed: {e}")))?;

        let rows: Vec<(i64, String, String, Option<String>, f32)> = sqlx::query_as(
            r#"SELECT c.id, c.path, c.content, c.source_url, v.distance
               FROM chunk_vec v
               JOIN chunks c ON c.id = v.rowid
               WHERE v.embedding MATCH ?
               ORDER BY v.distance ASC
               LIMIT ?"#,
        )
        .bind(payload)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(chunk_id, path, content, source_url, distance)| ChunkHit {
                chunk_id,
                path,
                content,
                source_url,
                distance,
            })
            .collect())
    }
}

fn init_sqlite_vec_once() -> KnowledgeResult<()> {
    let rc = *SQLITE_VEC_INIT_RC.get_or_init(|| unsafe {
        type SqliteVecInitFn =
            unsafe extern "C" fn(*mut sqlite3, *mut *const i8, *const sqlite3_api_routines) -> i32;

        sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteVecInitFn>(
            sqlite3_vec_init as *const (),
        )))
    });

    if rc == SQLITE_OK {
        Ok(())
    } else {
        Err(KnowledgeError::SqliteVec(format!(
            "sqlite-vec init failed with code {rc}"
        )))
    }
}

async fn run_migrations(pool: &SqlitePool) -> KnowledgeResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn vec_table_exists(pool: &SqlitePool) -> KnowledgeResult<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'chunk_vec'",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

async fn ensure_vec_table(pool: &SqlitePool, embedding_dim: Option<usize>) -> KnowledgeResult<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT value FROM meta WHERE key = 'embedding_dim' LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let dim = if let Some((value,)) = existing {
        value.parse::<usize>().ok()
    } else {
        embedding_dim
    };

    if let Some(dimension) = dim {
        ensure_vec_table_dim(pool, dimension).await?;
    }

    Ok(())
}

pub async fn ensure_vec_table_dim(pool: &SqlitePool, dimension: usize) -> KnowledgeResult<()> {
    if !vec_table_exists(pool).await? {
        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_vec USING vec0(embedding float[{}])",
            dimension
        );
        sqlx::query(&create_sql).execute(pool).await?;
    }

    sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES ('embedding_dim', ?)")
        .bind(dimension.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
