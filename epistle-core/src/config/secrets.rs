//! Secrets configuration loaded from environment variables only.
//!
//! This module handles sensitive configuration like API keys that should
//! never be stored in files. All secrets are read from environment variables.

use std::env;

/// Secrets loaded exclusively from environment variables.
///
/// These are sensitive values that should never be written to disk
/// or committed to version control.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Anthropic API key (env: ANTHROPIC_API_KEY)
    pub anthropic_api_key: Option<String>,

    /// Gmail OAuth access token (env: GMAIL_ACCESS_TOKEN)
    pub gmail_access_token: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("No generation API key configured. Set ANTHROPIC_API_KEY")]
    NoProviderConfigured,
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    pub fn from_env() -> Result<Self, SecretsError> {
        // Load .env file if present (development convenience)
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let secrets = Self {
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            gmail_access_token: env::var("GMAIL_ACCESS_TOKEN").ok(),
        };

        // The generation provider is required; the mailbox token is checked
        // later, when the mail loop is actually started.
        if secrets.anthropic_api_key.is_none() {
            return Err(SecretsError::NoProviderConfigured);
        }

        Ok(secrets)
    }

    /// The Anthropic API key, if configured.
    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.anthropic_api_key.as_deref()
    }

    /// The Gmail access token, if configured.
    pub fn gmail_access_token(&self) -> Option<&str> {
        self.gmail_access_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test because the environment is process-global and tests run in
    // parallel threads.
    #[test]
    fn secrets_from_environment() {
        unsafe {
            env::remove_var("ANTHROPIC_API_KEY");
            env::remove_var("GMAIL_ACCESS_TOKEN");
        }
        assert!(matches!(
            Secrets::from_env_inner(),
            Err(SecretsError::NoProviderConfigured)
        ));

        unsafe {
            env::set_var("ANTHROPIC_API_KEY", "sk-test");
            env::set_var("GMAIL_ACCESS_TOKEN", "ya29.test");
        }
        let secrets = Secrets::from_env_inner().expect("secrets");
        assert_eq!(secrets.anthropic_api_key(), Some("sk-test"));
        assert_eq!(secrets.gmail_access_token(), Some("ya29.test"));
    }
}
