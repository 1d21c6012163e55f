//! The mailbox seam.
//!
//! The pipeline needs exactly two operations from a mail provider; tests
//! substitute an in-memory implementation.

use crate::errors::MailResult;
use crate::models::{DraftReply, EmailThread};

#[async_trait::async_trait]
pub trait Mailbox: Send + Sync {
    /// Threads the provider currently considers new. The caller handles
    /// dedup against previously seen ids; implementations may return
    /// overlapping results across calls.
    async fn list_new_threads(&self) -> MailResult<Vec<EmailThread>>;

    /// Persist a draft reply on the given thread.
    async fn save_draft(&self, thread_id: &str, draft: &DraftReply) -> MailResult<()>;
}
