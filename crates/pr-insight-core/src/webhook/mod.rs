//! Inbound webhook handling: the raw envelope, signature verification and the
//! typed pull request event.

pub mod events;
pub mod validation;

use bytes::Bytes;

pub use events::{
    InstallationPayload, OwnerPayload, PullRequestEvent, PullRequestPayload, RepositoryPayload,
};
pub use validation::{sign_payload, verify_signature, SignatureVerifier};

/// Header carrying the HMAC-SHA256 signature of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header naming the event type (`pull_request`, `ping`, ...).
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying GitHub's unique delivery identifier.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// The only event type this service analyses.
pub const PULL_REQUEST_EVENT: &str = "pull_request";

/// One inbound webhook delivery, exactly as received.
///
/// The body is kept as raw bytes so the signature can be checked against what
/// was actually sent.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    body: Bytes,
    signature: Option<String>,
    event_type: Option<String>,
    delivery_id: String,
}

impl WebhookEnvelope {
    /// Create an envelope from the request parts.
    ///
    /// A missing delivery id is replaced by a fresh UUID so every delivery can
    /// be correlated in logs.
    pub fn new(
        body: Bytes,
        signature: Option<String>,
        event_type: Option<String>,
        delivery_id: Option<String>,
    ) -> Self {
        let delivery_id = delivery_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            body,
            signature,
            event_type,
            delivery_id,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }

    /// Whether the event header names something other than `pull_request`.
    ///
    /// An absent header is not treated as foreign; the payload decides.
    pub fn is_foreign_event(&self) -> bool {
        matches!(self.event_type(), Some(event) if event != PULL_REQUEST_EVENT)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
