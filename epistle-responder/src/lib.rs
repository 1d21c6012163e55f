//! Email triage and retrieval-augmented drafting for epistle.

pub mod app;
pub mod categorize;
pub mod compose;
pub mod errors;
pub mod gmail;
pub mod mailbox;
pub mod models;
pub mod poller;
pub mod providers;
pub mod seen;

pub use categorize::Categorizer;
pub use compose::ResponseComposer;
pub use errors::{MailError, MailResult};
pub use mailbox::Mailbox;
pub use models::{DraftReply, DraftResponse, EmailMessage, EmailThread};
pub use poller::MailPoller;
pub use providers::{Provider, ProviderError};
pub use seen::SeenThreads;
