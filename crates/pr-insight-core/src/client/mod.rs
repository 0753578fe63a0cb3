//! GitHub REST client for pull request retrieval.
//!
//! All calls are made with an installation token minted for the current
//! delivery. The client itself holds no per-delivery state; the underlying
//! `reqwest::Client` only pools connections.

mod pull_request;

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::InstallationToken;
use crate::error::ApiError;

pub use pull_request::{
    PullRequest, PullRequestBranch, PullRequestRef, PullRequestSnapshot, PullRequestUser,
};

/// Media type for JSON resources.
pub const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Media type that makes GitHub render a pull request as a unified diff.
pub const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";

/// Configuration for GitHub API client behavior.
///
/// # Examples
///
/// ```
/// use pr_insight_core::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_github_api_url("https://github.example.com/api/v3")
///     .with_timeout(Duration::from_secs(20));
/// assert_eq!(config.timeout, Some(Duration::from_secs(20)));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout. `None` waits as long as the transport allows.
    pub timeout: Option<Duration>,
    /// GitHub API base URL
    pub github_api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "pr-insight".to_string(),
            timeout: None,
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the GitHub API base URL.
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set or clear the request timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the GitHub API base URL.
    pub fn github_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.github_api_url = url.into();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull request retrieval as seen by the dispatcher.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Fetch metadata and the unified diff for one pull request.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if either request fails or returns a non-2xx status.
    async fn fetch_pull_request(
        &self,
        token: &InstallationToken,
        target: &PullRequestRef,
    ) -> Result<PullRequestSnapshot, ApiError>;
}

/// GitHub API client for installation-authenticated reads.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl GitHubClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder.build().map_err(|e| ApiError::Configuration {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn pull_request_url(&self, target: &PullRequestRef) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.config.github_api_url.trim_end_matches('/'),
            target.owner,
            target.repo,
            target.number
        )
    }

    /// Issue an authenticated GET and fail on any non-2xx status.
    async fn get_with_accept(
        &self,
        url: &str,
        token: &InstallationToken,
        accept: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", accept)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
