//! Shared configuration and utilities for epistle.

pub mod config;
pub mod retry;

pub use config::{
    CategoryLabel, Config, ConfigError, EmbeddingSettings, GenerationSettings, MailSettings,
    SearchDefaults, Secrets, SecretsError, Settings, SettingsError, Taxonomy, VaultSettings,
};
pub use retry::{RetryPolicy, retry_with_backoff};
