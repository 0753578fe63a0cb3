//! Error types for the webhook-to-insight pipeline.
//!
//! Each pipeline stage has its own error type. The dispatcher folds them into
//! [`DispatchError`], which the HTTP layer maps onto status codes.

use thiserror::Error;

use crate::auth::InstallationId;

/// Credential exchange errors (JWT signing and installation token exchange).
///
/// None of the variants carry token or key material.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid private key format or data.
    #[error("Invalid private key: {message}")]
    InvalidPrivateKey { message: String },

    /// JWT generation failed.
    #[error("JWT generation failed: {message}")]
    JwtGenerationFailed { message: String },

    /// GitHub rejected the installation token exchange.
    #[error("Token exchange for installation {installation_id} failed: {status} - {message}")]
    TokenExchangeFailed {
        installation_id: InstallationId,
        status: u16,
        message: String,
    },

    /// The token endpoint answered 2xx but the body was not a token response.
    #[error("Invalid token response: {message}")]
    InvalidTokenResponse { message: String },

    /// Network connectivity or transport error.
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Errors while fetching pull request data from the GitHub API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from GitHub API.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Failed to parse JSON response from GitHub API.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// The HTTP client could not be constructed.
    #[error("Client configuration error: {message}")]
    Configuration { message: String },
}

/// Errors from the AI inference collaborator.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The inference endpoint returned a non-success status.
    #[error("Inference endpoint returned {status}: {message}")]
    HttpError { status: u16, message: String },

    /// HTTP client error (network, TLS, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// The response body did not match any known completion shape.
    #[error("Invalid inference response: {message}")]
    InvalidResponse { message: String },

    /// The completion contained no text.
    #[error("Inference response contained no text")]
    EmptyResponse,
}

/// Input validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field has an invalid format.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    /// A field value is out of the acceptable range.
    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Terminal error for a single webhook delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `X-Hub-Signature-256` header did not match the body.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The verified body is not a pull request event.
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// JWT signing or installation token exchange failed.
    #[error("Credential exchange failed: {0}")]
    Credential(#[from] AuthError),

    /// Pull request metadata or diff retrieval failed.
    #[error("Pull request fetch failed: {0}")]
    UpstreamFetch(#[from] ApiError),

    /// The AI collaborator call failed.
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl DispatchError {
    /// Whether the failure was caused by the request itself rather than a
    /// downstream dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::MalformedPayload { .. }
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
