//! Integration tests for the mail pipeline: polling, triage, drafting.
//!
//! External services are replaced at their seams: an in-memory mailbox, a
//! scripted generation provider, and a deterministic embedder over a real
//! sqlite-vec store in a temp directory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use epistle_core::config::{SearchDefaults, Taxonomy};
use epistle_knowledge::embeddings::EmbeddingProvider;
use epistle_knowledge::errors::KnowledgeResult;
use epistle_knowledge::search::Retriever;
use epistle_knowledge::store::KnowledgeStore;
use epistle_knowledge::sync::VaultSynchronizer;
use epistle_knowledge::{EmbeddingSettings, VaultSettings};

use epistle_responder::app::handle_thread;
use epistle_responder::categorize::Categorizer;
use epistle_responder::compose::{INSUFFICIENT_MARKER, ResponseComposer};
use epistle_responder::errors::MailResult;
use epistle_responder::mailbox::Mailbox;
use epistle_responder::models::{DraftReply, DraftResponse, EmailMessage, EmailThread};
use epistle_responder::poller::MailPoller;
use epistle_responder::providers::{Provider, ProviderError};

// ── test doubles ─────────────────────────────────────────────────────

struct TestEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for TestEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        Ok(inputs
            .iter()
            .map(|text| {
                let mut v = [0f32; 8];
                for (idx, byte) in text.bytes().enumerate() {
                    v[idx % 8] += byte as f32;
                }
                let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
                v.iter().map(|x| x / norm).collect()
            })
            .collect())
    }
}

/// Provider that plays back a fixed script of responses, one per call.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    fn model(&self) -> &str {
        "scripted"
    }
    async fn send_message(&self, _system: &str, _content: &str) -> Result<String, ProviderError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ProviderError::Api { message }),
            None => Err(ProviderError::Api {
                message: "script exhausted: unexpected provider call".to_string(),
            }),
        }
    }
}

/// In-memory mailbox: returns the same listing on every call and records
/// saved drafts.
#[derive(Default)]
struct MockMailbox {
    threads: Vec<EmailThread>,
    drafts: Mutex<Vec<(String, DraftReply)>>,
}

impl MockMailbox {
    fn with_threads(threads: Vec<EmailThread>) -> Self {
        Self {
            threads,
            drafts: Mutex::new(Vec::new()),
        }
    }

    fn saved_drafts(&self) -> Vec<(String, DraftReply)> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mailbox for MockMailbox {
    async fn list_new_threads(&self) -> MailResult<Vec<EmailThread>> {
        Ok(self.threads.clone())
    }

    async fn save_draft(&self, thread_id: &str, draft: &DraftReply) -> MailResult<()> {
        self.drafts
            .lock()
            .unwrap()
            .push((thread_id.to_string(), draft.clone()));
        Ok(())
    }
}

fn thread(id: &str, subject: &str, body: &str) -> EmailThread {
    EmailThread {
        id: id.to_string(),
        subject: subject.to_string(),
        sender: "alice@example.com".to_string(),
        messages: vec![EmailMessage {
            sender: "alice@example.com".to_string(),
            body: body.to_string(),
        }],
    }
}

fn taxonomy() -> Taxonomy {
    Taxonomy::new(vec![
        "QUESTION".to_string(),
        "NEWSLETTER".to_string(),
        "SPAM".to_string(),
    ])
}

/// A knowledge stack over a temp directory, optionally seeded with the
/// pricing note.
struct Knowledge {
    retriever: Arc<Retriever>,
    _temp: TempDir,
}

async fn knowledge(seed_pricing_note: bool) -> Knowledge {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("vault");
    tokio::fs::create_dir_all(root.join("notes")).await.unwrap();
    let db_path = temp.path().join("index.sqlite3");

    let vault = VaultSettings {
        root: Some(root.clone()),
        db_path: Some(db_path.clone()),
        ..Default::default()
    };
    let embedding = EmbeddingSettings {
        dim: Some(8),
        ..Default::default()
    };

    let store = KnowledgeStore::open(&db_path, embedding.dim).await.unwrap();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(TestEmbedder);
    let synchronizer =
        VaultSynchronizer::new(vault, &embedding, store.clone(), Arc::clone(&embedder));
    let retriever = Arc::new(Retriever::new(store, embedder));

    if seed_pricing_note {
        tokio::fs::write(
            root.join("notes").join("pricing.md"),
            "Tier A costs $10/mo, source: https://example.com/pricing",
        )
        .await
        .unwrap();
        synchronizer.full_resync().await.unwrap();
    }

    Knowledge {
        retriever,
        _temp: temp,
    }
}

fn composer(provider: Arc<dyn Provider>, knowledge: &Knowledge) -> ResponseComposer {
    ResponseComposer::new(
        provider,
        Arc::clone(&knowledge.retriever),
        &SearchDefaults::default(),
    )
}

// ── poller ───────────────────────────────────────────────────────────

#[tokio::test]
async fn second_poll_without_new_mail_is_empty() {
    let temp = TempDir::new().unwrap();
    let state_file = temp.path().join("seen_threads.json");
    let mailbox = Arc::new(MockMailbox::with_threads(vec![
        thread("t1", "Pricing", "What does Tier A cost?"),
        thread("t2", "Hello", "Just saying hi"),
        // Duplicate id within the same listing must be collapsed as well.
        thread("t1", "Pricing", "What does Tier A cost?"),
    ]));

    let mut poller = MailPoller::new(mailbox.clone(), state_file.clone()).unwrap();
    let first = poller.poll().await.unwrap();
    assert_eq!(
        first.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        vec!["t1", "t2"]
    );

    let second = poller.poll().await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn seen_state_survives_a_restart() {
    let temp = TempDir::new().unwrap();
    let state_file = temp.path().join("seen_threads.json");
    let mailbox = Arc::new(MockMailbox::with_threads(vec![thread(
        "t1",
        "Pricing",
        "What does Tier A cost?",
    )]));

    let mut poller = MailPoller::new(mailbox.clone(), state_file.clone()).unwrap();
    assert_eq!(poller.poll().await.unwrap().len(), 1);
    drop(poller);

    let mut restarted = MailPoller::new(mailbox, state_file).unwrap();
    assert!(restarted.poll().await.unwrap().is_empty());
}

// ── categorizer ──────────────────────────────────────────────────────

#[tokio::test]
async fn categorization_stays_within_the_taxonomy() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(
        r#"["QUESTION", "URGENT", "newsletter", "not-a-label"]"#,
    )]));
    let categorizer = Categorizer::new(provider, taxonomy());

    let labels = categorizer
        .categorize(&thread("t1", "Pricing", "What does Tier A cost?"))
        .await
        .unwrap();

    let as_strings: Vec<&str> = labels.iter().map(|label| label.as_str()).collect();
    assert_eq!(as_strings, vec!["NEWSLETTER", "QUESTION"]);
}

// ── composer ─────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_retrieval_abstains_without_calling_the_provider() {
    let knowledge = knowledge(false).await;
    // Any provider call would fail the test.
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let composer = composer(provider, &knowledge);

    let draft = composer
        .compose(&thread("t1", "Pricing", "What does Tier A cost?"))
        .await
        .unwrap();
    assert_eq!(draft, DraftResponse::Abstain);
}

#[tokio::test]
async fn insufficient_context_marker_abstains() {
    let knowledge = knowledge(true).await;
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(INSUFFICIENT_MARKER)]));
    let composer = composer(provider, &knowledge);

    let draft = composer
        .compose(&thread("t1", "Roadmap", "When does Tier B launch?"))
        .await
        .unwrap();
    assert_eq!(draft, DraftResponse::Abstain);
}

#[tokio::test]
async fn grounded_reply_carries_provenance_footnotes() {
    let knowledge = knowledge(true).await;
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(
        "<p>Tier A costs <b>$10/mo</b>.</p>",
    )]));
    let composer = composer(provider, &knowledge);

    let draft = composer
        .compose(&thread("t1", "Pricing", "What does Tier A cost?"))
        .await
        .unwrap();
    let DraftResponse::Reply(reply) = draft else {
        panic!("expected a reply");
    };
    assert!(reply.html_body.contains("$10/mo"));
    assert_eq!(reply.footnotes, vec!["https://example.com/pricing".to_string()]);
}

// ── full pipeline ────────────────────────────────────────────────────

#[tokio::test]
async fn question_email_ends_up_as_a_saved_draft() {
    let knowledge = knowledge(true).await;
    let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![
        Ok(r#"["QUESTION"]"#),
        Ok("<p>Tier A costs <b>$10/mo</b>.</p>"),
    ]));
    let categorizer = Categorizer::new(Arc::clone(&provider), taxonomy());
    let composer = composer(provider, &knowledge);
    let mailbox = MockMailbox::default();
    let respond_label = taxonomy().resolve("QUESTION").unwrap();

    let email = thread("t1", "Pricing", "What does Tier A cost?");
    handle_thread(&categorizer, &composer, &mailbox, &respond_label, &email)
        .await
        .unwrap();

    let drafts = mailbox.saved_drafts();
    assert_eq!(drafts.len(), 1);
    let (thread_id, reply) = &drafts[0];
    assert_eq!(thread_id, "t1");
    assert!(reply.html_body.contains("$10/mo"));
    assert!(reply.html_body.contains("https://example.com/pricing"));
    assert_eq!(reply.footnotes, vec!["https://example.com/pricing".to_string()]);
}

#[tokio::test]
async fn non_question_thread_is_not_drafted() {
    let knowledge = knowledge(true).await;
    let provider: Arc<dyn Provider> =
        Arc::new(ScriptedProvider::new(vec![Ok(r#"["NEWSLETTER"]"#)]));
    let categorizer = Categorizer::new(Arc::clone(&provider), taxonomy());
    let composer = composer(provider, &knowledge);
    let mailbox = MockMailbox::default();
    let respond_label = taxonomy().resolve("QUESTION").unwrap();

    let email = thread("t2", "Weekly digest", "Here is this week's digest");
    handle_thread(&categorizer, &composer, &mailbox, &respond_label, &email)
        .await
        .unwrap();

    assert!(mailbox.saved_drafts().is_empty());
}

#[tokio::test]
async fn categorization_failure_leaves_the_thread_eligible_for_drafting() {
    let knowledge = knowledge(true).await;
    let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![
        Err("classifier unavailable"),
        Ok("<p>Tier A costs <b>$10/mo</b>.</p>"),
    ]));
    let categorizer = Categorizer::new(Arc::clone(&provider), taxonomy());
    let composer = composer(provider, &knowledge);
    let mailbox = MockMailbox::default();
    let respond_label = taxonomy().resolve("QUESTION").unwrap();

    let email = thread("t3", "Pricing", "What does Tier A cost?");
    handle_thread(&categorizer, &composer, &mailbox, &respond_label, &email)
        .await
        .unwrap();

    assert_eq!(mailbox.saved_drafts().len(), 1);
}
