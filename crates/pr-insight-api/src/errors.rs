//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pr_insight_core::DispatchError;
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// - `401 Unauthorized`: the signature did not match the body
/// - `400 Bad Request`: the verified body is not a pull request event
/// - `500 Internal Server Error`: a downstream stage failed
///
/// Responses are plain text. GitHub redelivery is the only retry path, so no
/// `Retry-After` header is set.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let Self::Dispatch(e) = self;

        let (status, message) = match &e {
            DispatchError::InvalidSignature => {
                warn!("Webhook signature validation failed");
                (StatusCode::UNAUTHORIZED, "Invalid signature".to_string())
            }
            DispatchError::MalformedPayload { .. } => {
                warn!(error = %e, "Webhook payload rejected");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            DispatchError::Credential(_)
            | DispatchError::UpstreamFetch(_)
            | DispatchError::Inference(_) => {
                error!(error = %e, "Webhook processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to process webhook: {}", e),
                )
            }
        };

        (status, message).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
