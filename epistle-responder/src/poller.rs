//! Mail polling with dedup against the persisted seen set.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::MailResult;
use crate::mailbox::Mailbox;
use crate::models::EmailThread;
use crate::seen::SeenThreads;

pub struct MailPoller {
    mailbox: Arc<dyn Mailbox>,
    seen: SeenThreads,
    state_file: PathBuf,
}

impl MailPoller {
    pub fn new(mailbox: Arc<dyn Mailbox>, state_file: PathBuf) -> MailResult<Self> {
        let seen = SeenThreads::load(&state_file)?;
        debug!("loaded {} previously seen thread ids", seen.len());
        Ok(Self {
            mailbox,
            seen,
            state_file,
        })
    }

    /// Threads not yet handed to downstream processing. Ids are marked seen
    /// before returning, so each thread is delivered at most once per run
    /// lifetime; duplicates within one provider response are collapsed too.
    pub async fn poll(&mut self) -> MailResult<Vec<EmailThread>> {
        let listed = self.mailbox.list_new_threads().await?;

        let mut fresh = Vec::new();
        for thread in listed {
            if thread.id.is_empty() {
                warn!("dropping thread without an id (subject: {})", thread.subject);
                continue;
            }
            // insert() is false for both previously-seen ids and in-batch
            // duplicates.
            if self.seen.insert(thread.id.clone()) {
                fresh.push(thread);
            }
        }

        if !fresh.is_empty() {
            self.seen.save(&self.state_file).await?;
        }

        Ok(fresh)
    }
}
