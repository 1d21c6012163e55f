//! Configuration management for epistle.
//!
//! This module provides a unified configuration system that separates
//! secrets (from environment variables) from settings (from TOML files).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `ANTHROPIC_API_KEY` - Anthropic API key for the generation provider
//! - `GMAIL_ACCESS_TOKEN` - OAuth access token for the Gmail mailbox
//!
//! ## Settings (TOML File)
//! Located at `~/.config/epistle/config.toml` (override with `EPISTLE_CONFIG`):
//! ```toml
//! [vault]
//! root = "/home/me/notes"
//! chunk_chars = 1200
//! chunk_overlap = 200
//!
//! [embedding]
//! url = "http://127.0.0.1:11434"
//! model = "qwen3-embedding:8b"
//!
//! [generation]
//! model = "claude-sonnet-4-5"
//!
//! [mail]
//! poll_seconds = 60
//! taxonomy = ["QUESTION", "FOLLOW_UP", "NEWSLETTER", "NOTIFICATION", "SPAM"]
//! respond_label = "QUESTION"
//! ```

mod secrets;
mod settings;
mod taxonomy;
mod vault;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    EmbeddingSettings, GenerationSettings, MailSettings, SearchDefaults, Settings, SettingsError,
};
pub use taxonomy::{CategoryLabel, Taxonomy};
pub use vault::VaultSettings;

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Respond label '{0}' is not part of the configured taxonomy")]
    RespondLabelNotInTaxonomy(String),

    #[error("Taxonomy must contain at least one label")]
    EmptyTaxonomy,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// This loads:
    /// 1. Secrets from environment variables
    /// 2. Settings from TOML file (creating defaults if needed)
    ///
    /// # Errors
    ///
    /// Returns an error if the generation API key is missing, the TOML file
    /// cannot be read or parsed, or the mail taxonomy does not contain the
    /// configured respond label.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;

        let config = Self { secrets, settings };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.mail.taxonomy.is_empty() {
            return Err(ConfigError::EmptyTaxonomy);
        }
        let taxonomy = self.taxonomy();
        if taxonomy
            .resolve(&self.settings.mail.respond_label)
            .is_none()
        {
            return Err(ConfigError::RespondLabelNotInTaxonomy(
                self.settings.mail.respond_label.clone(),
            ));
        }
        Ok(())
    }

    /// The closed category taxonomy configured for email triage.
    pub fn taxonomy(&self) -> Taxonomy {
        Taxonomy::new(self.settings.mail.taxonomy.clone())
    }

    /// The label that gates response drafting, resolved against the taxonomy.
    pub fn respond_label(&self) -> Option<CategoryLabel> {
        self.taxonomy().resolve(&self.settings.mail.respond_label)
    }
}
