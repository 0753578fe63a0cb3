//! Configuration types for the HTTP service

use std::path::Path;
use std::time::Duration;

use pr_insight_core::auth::AuthConfig;
use pr_insight_core::client::ClientConfig;
use pr_insight_core::diff_filter::{DiffFilter, GeneratedFilePatterns};
use pr_insight_core::inference::InferenceConfig;
use pr_insight_core::prompt::{AnalysisKind, PromptBuilder};
use pr_insight_core::{DispatcherConfig, TriggerMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ConfigError;

/// Prefix for environment overrides, e.g. `PR_INSIGHT__SERVER__PORT`.
pub const ENV_PREFIX: &str = "PR_INSIGHT";

/// Optional system-wide configuration file (extension resolved by the loader).
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pr-insight/service";

/// Optional configuration file relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = "config/service";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook endpoint settings
    pub webhooks: WebhookConfig,

    /// GitHub API settings
    pub github: GitHubConfig,

    /// What to analyse and how
    pub analysis: AnalysisConfig,

    /// AI inference endpoint settings
    pub inference: InferenceServiceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
            shutdown_timeout_seconds: 30,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/github-webhook".to_string(),
        }
    }
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL (GitHub Enterprise uses `https://host/api/v3`)
    pub api_url: String,

    pub user_agent: String,

    /// Outbound request timeout. Unset means no timeout.
    pub request_timeout_seconds: Option<u64>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            user_agent: "pr-insight".to_string(),
            request_timeout_seconds: None,
        }
    }
}

impl GitHubConfig {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            github_api_url: self.api_url.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.request_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::builder()
            .github_api_url(&self.api_url)
            .user_agent(&self.user_agent)
            .timeout(self.request_timeout_seconds.map(Duration::from_secs))
            .build()
    }
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Which pull request activity starts an analysis
    pub trigger: TriggerMode,

    /// Summary or review score
    pub kind: AnalysisKind,

    /// Truncate diffs longer than this many characters
    pub max_diff_chars: Option<usize>,

    /// Extra path regexes excluded from the diff, on top of the built-in list
    pub extra_excluded_patterns: Vec<String>,
}

impl AnalysisConfig {
    /// Build the pipeline settings for the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if an extra pattern does not compile.
    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, ConfigError> {
        let patterns = GeneratedFilePatterns::with_additional(&self.extra_excluded_patterns)
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })?;

        Ok(DispatcherConfig {
            trigger: self.trigger,
            prompt_builder: PromptBuilder::new(self.kind).with_max_diff_chars(self.max_diff_chars),
            diff_filter: DiffFilter::new(patterns),
        })
    }
}

/// AI inference endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceServiceConfig {
    /// Full chat-completions URL
    pub endpoint_url: String,

    pub model: String,

    /// Ask for a JSON object when producing review scores
    pub json_response: bool,

    pub request_timeout_seconds: Option<u64>,
}

impl Default for InferenceServiceConfig {
    fn default() -> Self {
        let defaults = InferenceConfig::default();
        Self {
            endpoint_url: defaults.endpoint_url,
            model: defaults.model,
            json_response: defaults.json_response,
            request_timeout_seconds: None,
        }
    }
}

impl InferenceServiceConfig {
    pub fn inference_config(&self, user_agent: &str) -> InferenceConfig {
        InferenceConfig {
            endpoint_url: self.endpoint_url.clone(),
            model: self.model.clone(),
            json_response: self.json_response,
            user_agent: user_agent.to_string(),
            timeout: self.request_timeout_seconds.map(Duration::from_secs),
        }
    }
}

impl ServiceConfig {
    /// Check the loaded configuration for values that would fail at runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be between 1 and 65535"));
        }

        if self.server.max_body_size == 0 {
            return Err(invalid("server.max_body_size must be greater than zero"));
        }

        let path = &self.webhooks.endpoint_path;
        if !path.starts_with('/') {
            return Err(invalid(format!(
                "webhooks.endpoint_path must start with '/': '{}'",
                path
            )));
        }
        if path == "/" || path == "/health" {
            return Err(invalid(format!(
                "webhooks.endpoint_path '{}' collides with a built-in route",
                path
            )));
        }

        validate_http_url("github.api_url", &self.github.api_url)?;
        validate_http_url("inference.endpoint_url", &self.inference.endpoint_url)?;

        if self.github.user_agent.trim().is_empty() {
            return Err(invalid("github.user_agent must not be empty"));
        }

        if self.inference.model.trim().is_empty() {
            return Err(invalid("inference.model must not be empty"));
        }

        if self.analysis.max_diff_chars == Some(0) {
            return Err(invalid("analysis.max_diff_chars must be greater than zero"));
        }

        self.analysis.dispatcher_config()?;

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| invalid(format!("{} is not a valid URL '{}': {}", key, value, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(format!(
            "{} must use http or https, got '{}'",
            key, scheme
        ))),
    }
}

/// Load configuration from files and `PR_INSIGHT__*` environment variables.
///
/// Later sources override earlier ones:
/// 1. `/etc/pr-insight/service.{yaml,yml}` (optional)
/// 2. `config/service.{yaml,yml}` (optional)
/// 3. `explicit_path` (required when given; format from its extension)
/// 4. environment, `PR_INSIGHT__SECTION__KEY`
///
/// `PR_INSIGHT__ANALYSIS__EXTRA_EXCLUDED_PATTERNS` takes a comma-separated list.
///
/// # Errors
///
/// Returns `ConfigError::Loading` if a source cannot be read or the merged
/// values do not deserialize.
pub fn load_service_config(explicit_path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_service_config_from(explicit_path, environment_source())
}

/// The `PR_INSIGHT__*` environment source with typed values and list keys.
pub fn environment_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("analysis.extra_excluded_patterns")
}

/// Like [`load_service_config`] with a caller-supplied environment source.
pub fn load_service_config_from(
    explicit_path: Option<&Path>,
    environment: config::Environment,
) -> Result<ServiceConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name(SYSTEM_CONFIG_PATH)
                .format(config::FileFormat::Yaml)
                .required(false),
        )
        .add_source(
            config::File::with_name(LOCAL_CONFIG_PATH)
                .format(config::FileFormat::Yaml)
                .required(false),
        );

    if let Some(path) = explicit_path {
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder.add_source(environment).build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
