//! Orchestration: two independent long-lived loops sharing only the
//! knowledge database, the vault watcher and the mail poll cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tracing::{info, warn};

use epistle_core::config::{CategoryLabel, Config};
use epistle_knowledge::embeddings::{EmbeddingProvider, OllamaEmbedder};
use epistle_knowledge::paths::{data_root, knowledge_db_path};
use epistle_knowledge::search::Retriever;
use epistle_knowledge::store::KnowledgeStore;
use epistle_knowledge::sync::VaultSynchronizer;
use epistle_knowledge::watcher::run_vault_watcher;

use crate::categorize::Categorizer;
use crate::compose::ResponseComposer;
use crate::errors::{MailError, MailResult};
use crate::gmail::GmailMailbox;
use crate::mailbox::Mailbox;
use crate::models::{DraftResponse, EmailThread};
use crate::poller::MailPoller;
use crate::providers::{AnthropicClient, Provider};

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let vault = config.settings.vault.clone();
    let db_path = knowledge_db_path(&vault)?;
    let store = KnowledgeStore::open(&db_path, config.settings.embedding.dim).await?;
    info!("knowledge store opened at {}", db_path.display());

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(OllamaEmbedder::new(&config.settings.embedding));
    let synchronizer = Arc::new(VaultSynchronizer::new(
        vault.clone(),
        &config.settings.embedding,
        store.clone(),
        Arc::clone(&embedder),
    ));
    let retriever = Arc::new(Retriever::new(store, embedder));

    let api_key = config
        .secrets
        .anthropic_api_key()
        .ok_or(MailError::MissingCredential("ANTHROPIC_API_KEY"))?;
    let provider: Arc<dyn Provider> = Arc::new(AnthropicClient::new(
        api_key,
        &config.settings.generation.model,
        config.settings.generation.max_tokens,
    ));
    info!(
        "generation client created ({}/{})",
        provider.name(),
        provider.model()
    );

    let token = config
        .secrets
        .gmail_access_token()
        .ok_or(MailError::MissingCredential("GMAIL_ACCESS_TOKEN"))?;
    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailMailbox::new(token));

    let state_file = match &config.settings.mail.state_file {
        Some(path) => path.clone(),
        None => data_root(&vault)?.join("seen_threads.json"),
    };
    let poller = MailPoller::new(Arc::clone(&mailbox), state_file)?;

    let categorizer = Categorizer::new(Arc::clone(&provider), config.taxonomy());
    let composer = ResponseComposer::new(provider, retriever, &config.settings.search);
    let respond_label = config
        .respond_label()
        .ok_or("respond label missing from taxonomy")?;

    let watcher_task = tokio::spawn(async move {
        if let Err(err) = run_vault_watcher(synchronizer).await {
            tracing::error!("vault watcher stopped: {err}");
        }
    });

    let poll_seconds = config.settings.mail.poll_seconds;
    let mail_task = tokio::spawn(run_mail_loop(
        poller,
        categorizer,
        composer,
        mailbox,
        respond_label,
        poll_seconds,
    ));

    info!("epistle responder running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    watcher_task.abort();
    mail_task.abort();
    Ok(())
}

/// The mail cycle: poll, categorize, draft, save. A single thread's failure
/// never takes the loop down.
pub async fn run_mail_loop(
    mut poller: MailPoller,
    categorizer: Categorizer,
    composer: ResponseComposer,
    mailbox: Arc<dyn Mailbox>,
    respond_label: CategoryLabel,
    poll_seconds: u64,
) {
    let period = Duration::from_secs(poll_seconds.max(1));
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        ticker.tick().await;

        let threads = match poller.poll().await {
            Ok(threads) => threads,
            Err(err) => {
                warn!("mail poll failed: {err}");
                continue;
            }
        };
        if !threads.is_empty() {
            info!("processing {} new thread(s)", threads.len());
        }

        for thread in threads {
            if let Err(err) = handle_thread(
                &categorizer,
                &composer,
                mailbox.as_ref(),
                &respond_label,
                &thread,
            )
            .await
            {
                warn!("handling thread {} failed: {err}", thread.id);
            }
        }
    }
}

/// Triage and (maybe) draft one thread.
pub async fn handle_thread(
    categorizer: &Categorizer,
    composer: &ResponseComposer,
    mailbox: &dyn Mailbox,
    respond_label: &CategoryLabel,
    thread: &EmailThread,
) -> MailResult<()> {
    let should_draft = match categorizer.categorize(thread).await {
        Ok(labels) => {
            info!(
                "thread {} labeled {:?}",
                thread.id,
                labels.iter().map(|label| label.as_str()).collect::<Vec<_>>()
            );
            labels.contains(respond_label)
        }
        Err(err) => {
            // Classification failure is non-fatal; the thread stays
            // eligible for drafting and the composer's evidence gate
            // decides.
            warn!("categorization failed for thread {}: {err}", thread.id);
            true
        }
    };
    if !should_draft {
        return Ok(());
    }

    match composer.compose(thread).await? {
        DraftResponse::Abstain => {
            info!("no grounded answer for thread {}, not drafting", thread.id);
        }
        DraftResponse::Reply(reply) => {
            mailbox.save_draft(&thread.id, &reply).await?;
            info!(
                "draft saved for thread {} ({} footnotes)",
                thread.id,
                reply.footnotes.len()
            );
        }
    }
    Ok(())
}
