//! Secret material read from the process environment.
//!
//! Secrets never come from configuration files and have no built-in
//! fallbacks. Values are held in zeroizing buffers and never appear in
//! `Debug` output.

use pr_insight_core::auth::{GitHubAppId, PrivateKey};
use zeroize::Zeroizing;

use crate::errors::ConfigError;

pub const WEBHOOK_SECRET_VAR: &str = "GITHUB_WEBHOOK_SECRET";
pub const APP_ID_VAR: &str = "GITHUB_APP_ID";
pub const PRIVATE_KEY_VAR: &str = "GITHUB_APP_PRIVATE_KEY";
pub const AI_API_KEY_VAR: &str = "AI_API_KEY";

/// Secrets required to verify deliveries and call GitHub and the model.
pub struct AppSecrets {
    webhook_secret: Zeroizing<String>,
    app_id: GitHubAppId,
    private_key: PrivateKey,
    ai_api_key: Option<Zeroizing<String>>,
}

impl AppSecrets {
    /// Read all secrets from the process environment.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing` if a mandatory variable is unset or blank
    /// - `ConfigError::Invalid` if the app ID or private key cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read all secrets through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_secret = required(&lookup, WEBHOOK_SECRET_VAR)?;

        let app_id = required(&lookup, APP_ID_VAR)?
            .parse::<GitHubAppId>()
            .map_err(|e| ConfigError::Invalid {
                message: format!("{}: {}", APP_ID_VAR, e),
            })?;

        let raw_key = required(&lookup, PRIVATE_KEY_VAR)?;
        let private_key = PrivateKey::from_config_value(&raw_key);
        private_key.validate().map_err(|e| ConfigError::Invalid {
            message: format!("{}: {}", PRIVATE_KEY_VAR, e),
        })?;

        let ai_api_key = lookup(AI_API_KEY_VAR)
            .map(Zeroizing::new)
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            webhook_secret,
            app_id,
            private_key,
            ai_api_key,
        })
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn ai_api_key(&self) -> Option<&Zeroizing<String>> {
        self.ai_api_key.as_ref()
    }
}

impl std::fmt::Debug for AppSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSecrets")
            .field("webhook_secret", &"<REDACTED>")
            .field("app_id", &self.app_id)
            .field("private_key", &"<REDACTED>")
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<Zeroizing<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(Zeroizing::new) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing {
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
