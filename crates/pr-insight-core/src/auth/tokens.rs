//! GitHub App installation token exchange.
//!
//! Every call to [`GitHubAppAuth::installation_token`] signs a fresh app
//! assertion and exchanges it for a new installation token. Nothing is
//! cached between deliveries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    AuthenticationProvider, GitHubAppId, InstallationId, InstallationToken, JsonWebToken,
    JwtGenerator,
};
use crate::error::AuthError;

/// Configuration for the token exchange.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// GitHub API endpoint (for GitHub Enterprise support)
    pub github_api_url: String,

    /// User agent for GitHub API requests
    pub user_agent: String,

    /// Optional request timeout. `None` leaves the HTTP client default.
    pub timeout: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            github_api_url: "https://api.github.com".to_string(),
            user_agent: "pr-insight".to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// GitHub App authentication provider.
///
/// Signs app assertions with the configured [`JwtGenerator`] and exchanges
/// them for installation tokens via
/// `POST {api}/app/installations/{id}/access_tokens`.
pub struct GitHubAppAuth {
    app_id: GitHubAppId,
    jwt_generator: Arc<dyn JwtGenerator>,
    http_client: reqwest::Client,
    config: AuthConfig,
}

impl GitHubAppAuth {
    /// Create a new authentication provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NetworkError` if the HTTP client cannot be built.
    pub fn new(
        app_id: GitHubAppId,
        jwt_generator: Arc<dyn JwtGenerator>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            app_id,
            jwt_generator,
            http_client,
            config,
        })
    }

    /// Get the authentication configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get the GitHub App ID this provider authenticates as.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }
}

#[async_trait]
impl AuthenticationProvider for GitHubAppAuth {
    async fn app_token(&self) -> Result<JsonWebToken, AuthError> {
        self.jwt_generator.generate_jwt(self.app_id).await
    }

    #[instrument(skip(self), fields(app_id = %self.app_id))]
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.app_token().await?;

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.config.github_api_url.trim_end_matches('/'),
            installation_id
        );

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(AuthError::TokenExchangeFailed {
                installation_id,
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidTokenResponse {
                message: format!("Failed to parse access token response: {}", e),
            })?;

        if body.token.is_empty() {
            return Err(AuthError::InvalidTokenResponse {
                message: "access token response contained an empty token".to_string(),
            });
        }

        debug!(
            installation_id = %installation_id,
            expires_at = ?body.expires_at,
            "Installation token issued"
        );

        Ok(InstallationToken::new(
            body.token,
            installation_id,
            body.expires_at,
        ))
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
