//! GitHub App authentication types and interfaces.
//!
//! This module provides the credential side of the pipeline:
//! - ID types (`GitHubAppId`, `InstallationId`)
//! - Token types (`JsonWebToken`, `InstallationToken`)
//! - The RSA `PrivateKey` used to sign app assertions
//! - The `AuthenticationProvider` seam used by the dispatcher
//!
//! Tokens are minted per webhook delivery and are never cached.

pub mod jwt;
pub mod tokens;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::{AuthError, ValidationError};

pub use jwt::{JwtGenerator, RS256JwtGenerator, ASSERTION_LIFETIME_SECONDS};
pub use tokens::{AuthConfig, GitHubAppAuth};

// ============================================================================
// Core ID Types
// ============================================================================

/// GitHub App identifier assigned during app registration.
///
/// # Examples
///
/// ```
/// use pr_insight_core::auth::GitHubAppId;
///
/// let app_id: GitHubAppId = "123456".parse().unwrap();
/// assert_eq!(app_id.as_u64(), 123456);
/// assert_eq!(app_id.to_string(), "123456");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitHubAppId(u64);

impl GitHubAppId {
    /// Create a new GitHub App ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GitHubAppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GitHubAppId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "github_app_id".to_string(),
                message: "must be a positive integer".to_string(),
            })?;
        Ok(Self::new(id))
    }
}

/// GitHub App installation identifier, taken from `installation.id` in the
/// webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    /// Create a new installation ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// Signed app assertion (JWT) used to authenticate as the GitHub App.
///
/// The token string is never exposed in Debug output.
#[derive(Clone)]
pub struct JsonWebToken {
    token: String,
    app_id: GitHubAppId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl JsonWebToken {
    /// Create a new JWT.
    ///
    /// # Arguments
    ///
    /// * `token` - The encoded JWT string
    /// * `app_id` - The GitHub App ID carried in the `iss` claim
    /// * `issued_at` - The `iat` claim
    /// * `expires_at` - The `exp` claim
    pub fn new(
        token: String,
        app_id: GitHubAppId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            app_id,
            issued_at,
            expires_at,
        }
    }

    /// Get the token string for the `Authorization: Bearer` header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the GitHub App ID this token represents.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// Get when this token was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Lifetime between `iat` and `exp`.
    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.issued_at
    }
}

// Security: Don't expose token in debug output
impl std::fmt::Debug for JsonWebToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWebToken")
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Installation-scoped access token.
///
/// Owned by a single webhook delivery. The provider-reported expiry is kept
/// for diagnostics only; tokens are never reused across deliveries.
#[derive(Clone)]
pub struct InstallationToken {
    token: String,
    installation_id: InstallationId,
    expires_at: Option<DateTime<Utc>>,
}

impl InstallationToken {
    /// Create a new installation token.
    pub fn new(
        token: String,
        installation_id: InstallationId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            token,
            installation_id,
            expires_at,
        }
    }

    /// Get the token string for the `Authorization: Bearer` header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the installation ID this token is for.
    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    /// Expiry reported by GitHub, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

// Security: Redact token in debug output
impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("installation_id", &self.installation_id)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Key Material
// ============================================================================

/// PEM-encoded RSA private key for signing app assertions.
///
/// The buffer is zeroed on drop and never exposed in Debug output.
#[derive(Clone)]
pub struct PrivateKey {
    key_data: Zeroizing<Vec<u8>>,
}

impl PrivateKey {
    /// Wrap raw PEM bytes without validating them.
    ///
    /// A malformed key is reported when the first JWT is signed.
    pub fn new(key_data: Vec<u8>) -> Self {
        Self {
            key_data: Zeroizing::new(key_data),
        }
    }

    /// Get the key data.
    pub fn key_data(&self) -> &[u8] {
        &self.key_data
    }
}

// Security: Don't expose key data in debug output
impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_data", &"<REDACTED>")
            .finish()
    }
}

/// JWT claims for GitHub App authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Issuer (GitHub App ID)
    pub iss: GitHubAppId,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// Credential exchange as seen by the dispatcher.
#[async_trait::async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Generate a signed app assertion.
    async fn app_token(&self) -> Result<JsonWebToken, AuthError>;

    /// Mint a fresh installation token for one delivery.
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
