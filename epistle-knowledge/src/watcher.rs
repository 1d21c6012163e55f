//! The vault watcher loop: filesystem notifications in, reconciliation out.
//!
//! Notifications are treated as hints. They are debounced for a couple of
//! seconds, coalesced per path, and mapped to `VaultChange`s by looking at
//! the filesystem itself; a periodic `full_resync` backstops anything the
//! notification stream missed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tracing::warn;

use crate::errors::KnowledgeResult;
use crate::models::VaultChange;
use crate::paths::vault_root;
use crate::sync::VaultSynchronizer;

const DEBOUNCE: Duration = Duration::from_secs(2);

pub async fn run_vault_watcher(synchronizer: Arc<VaultSynchronizer>) -> KnowledgeResult<()> {
    let root = vault_root(synchronizer.vault_settings())?;

    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Event>();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })?;

    if root.exists() {
        watcher.watch(&root, RecursiveMode::Recursive)?;
    }

    // Startup backstop; failures here are recoverable, the periodic pass
    // will try again.
    if let Err(err) = synchronizer.full_resync().await {
        warn!("startup resync failed: {err}");
    }

    let period = Duration::from_secs(synchronizer.reconcile_seconds().max(1));
    let mut resync = interval_at(Instant::now() + period, period);
    let mut pending: Vec<notify::Event> = Vec::new();

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                pending.push(event);
            }
            _ = tokio::time::sleep(DEBOUNCE) => {
                if !pending.is_empty() {
                    let changes = coalesce_events(std::mem::take(&mut pending));
                    for change in changes {
                        if let Err(err) = synchronizer.reconcile(change).await {
                            warn!("vault reconcile failed: {err}");
                        }
                    }
                }
            }
            _ = resync.tick() => {
                if let Err(err) = synchronizer.full_resync().await {
                    warn!("periodic resync failed: {err}");
                }
            }
        }
    }
}

/// Collapse a debounced burst of notifications into per-path changes.
///
/// Rename events that carry both paths become `Renamed`; everything else is
/// decided by whether the path still exists, which is robust against
/// duplicated and reordered notifications.
fn coalesce_events(events: Vec<notify::Event>) -> Vec<VaultChange> {
    let mut changes = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for event in events {
        if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind
            && event.paths.len() == 2
        {
            let from = event.paths[0].clone();
            let to = event.paths[1].clone();
            if is_markdown(&to) || is_markdown(&from) {
                seen.insert(from.clone());
                seen.insert(to.clone());
                changes.push(VaultChange::Renamed { from, to });
            }
            continue;
        }

        for path in event.paths {
            if !is_markdown(&path) {
                continue;
            }
            if !seen.insert(path.clone()) {
                continue;
            }
            if path.exists() {
                changes.push(VaultChange::Modified(path));
            } else {
                changes.push(VaultChange::Deleted(path));
            }
        }
    }

    changes
}

fn is_markdown(path: &std::path::Path) -> bool {
    path.extension().and_then(|v| v.to_str()) == Some("md")
}
