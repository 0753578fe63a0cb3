//! Webhook signature verification.
//!
//! Provides HMAC-SHA256 signature verification for GitHub webhooks using
//! constant-time comparison to prevent timing attacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::ValidationError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check an `X-Hub-Signature-256` header against the raw request body.
///
/// Returns `false` when the header is absent or empty, lacks the `sha256=`
/// prefix, carries invalid hex, or does not match. The HMAC is computed over
/// the exact bytes received; the body must not be re-serialized first.
///
/// # Examples
///
/// ```
/// use pr_insight_core::webhook::{sign_payload, verify_signature};
///
/// let body = br#"{"action":"opened"}"#;
/// let header = sign_payload(b"secret", body).unwrap();
///
/// assert!(verify_signature(b"secret", body, Some(&header)));
/// assert!(!verify_signature(b"other", body, Some(&header)));
/// assert!(!verify_signature(b"secret", body, None));
/// ```
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let Some(provided) = header.and_then(parse_signature) else {
        return false;
    };

    let Ok(expected) = compute_hmac(secret, body) else {
        return false;
    };

    constant_time_compare(&provided, &expected)
}

/// Produce the `sha256=<hex>` header value GitHub would send for `body`.
///
/// # Errors
///
/// Returns `ValidationError` if the HMAC cannot be keyed with `secret`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, ValidationError> {
    let digest = compute_hmac(secret, body)?;
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Extract the digest bytes from a `sha256=<hex>` header.
fn parse_signature(header: &str) -> Option<Vec<u8>> {
    let hex_signature = header.strip_prefix(SIGNATURE_PREFIX)?;
    if hex_signature.is_empty() {
        return None;
    }

    hex::decode(hex_signature).ok()
}

fn compute_hmac(secret: &[u8], body: &[u8]) -> Result<Vec<u8>, ValidationError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| ValidationError::InvalidFormat {
            field: "webhook_secret".to_string(),
            message: format!("Failed to create HMAC instance: {}", e),
        })?;

    mac.update(body);

    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret.
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Verifies webhook signatures with the shared secret held in memory.
///
/// The secret buffer is zeroed on drop and never exposed in Debug output.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Zeroizing<Vec<u8>>,
}

impl SignatureVerifier {
    /// Create a verifier for the given shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Verify a header value against the raw body.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> bool {
        verify_signature(&self.secret, body, header)
    }

    /// Sign a body with this verifier's secret.
    pub fn sign(&self, body: &[u8]) -> Result<String, ValidationError> {
        sign_payload(&self.secret, body)
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
