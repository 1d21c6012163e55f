//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/epistle/config.toml). Every field
//! has a serde default so a partial file, or no file at all, resolves to a
//! fully usable configuration.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::vault::VaultSettings;

/// Top-level settings, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub vault: VaultSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub search: SearchDefaults,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub mail: MailSettings,
}

/// Embedding service connection settings (Ollama-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector dimension. When unset, it is learned from the first
    /// embedding response and pinned in the database.
    #[serde(default)]
    pub dim: Option<usize>,
    #[serde(default = "default_embedding_batch")]
    pub batch: usize,
}

/// Retrieval tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Mail loop settings, including the closed category taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_taxonomy")]
    pub taxonomy: Vec<String>,
    /// Threads carrying this label get a drafted reply.
    #[serde(default = "default_respond_label")]
    pub respond_label: String,
    /// Override for the seen-thread state file location.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dim: None,
            batch: default_embedding_batch(),
        }
    }
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            poll_seconds: default_poll_seconds(),
            taxonomy: default_taxonomy(),
            respond_label: default_respond_label(),
            state_file: None,
        }
    }
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "qwen3-embedding:8b".to_string()
}

fn default_embedding_batch() -> usize {
    32
}

fn default_top_k() -> usize {
    5
}

fn default_max_query_chars() -> usize {
    2000
}

fn default_generation_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_poll_seconds() -> u64 {
    60
}

fn default_taxonomy() -> Vec<String> {
    ["QUESTION", "FOLLOW_UP", "NEWSLETTER", "NOTIFICATION", "SPAM"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_respond_label() -> String {
    "QUESTION".to_string()
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Settings {
    /// Load settings from the TOML config file, writing a default file on
    /// first run so the user has something to edit.
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::config_path()?;
        if !path.exists() {
            let settings = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, toml::to_string_pretty(&settings)?)?;
            return Ok(settings);
        }

        let raw = fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Path of the config file: `EPISTLE_CONFIG` override, or
    /// `<config dir>/epistle/config.toml`.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(path) = std::env::var("EPISTLE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(dir.join("epistle").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_resolves_to_defaults() {
        let settings: Settings = toml::from_str("").expect("parse");
        assert_eq!(settings.embedding.batch, 32);
        assert_eq!(settings.search.top_k, 5);
        assert_eq!(settings.mail.respond_label, "QUESTION");
        assert!(settings.mail.taxonomy.contains(&"SPAM".to_string()));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [vault]
            chunk_chars = 800

            [mail]
            poll_seconds = 15
            "#,
        )
        .expect("parse");
        assert_eq!(settings.vault.chunk_chars, 800);
        assert_eq!(settings.vault.chunk_overlap, 200);
        assert_eq!(settings.mail.poll_seconds, 15);
        assert_eq!(settings.generation.max_tokens, 1024);
    }

    #[test]
    fn default_settings_round_trip() {
        let rendered = toml::to_string_pretty(&Settings::default()).expect("serialize");
        let parsed: Settings = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed.embedding.model, Settings::default().embedding.model);
    }
}
