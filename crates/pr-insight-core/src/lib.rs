//! # PR Insight Core
//!
//! The webhook-to-insight pipeline for GitHub pull requests.
//!
//! A signed `pull_request` webhook delivery is verified, the GitHub App's
//! credentials are exchanged for an installation token, the pull request and
//! its unified diff are fetched, generated files are filtered out of the diff
//! and the result is assembled into a prompt for an AI model.
//!
//! ## Pipeline
//!
//! ```text
//! WebhookEnvelope
//!   -> webhook::validation   (HMAC-SHA256 over the raw body)
//!   -> webhook::events       (typed PullRequestEvent)
//!   -> auth                  (RS256 JWT -> installation token)
//!   -> client                (PR metadata + diff)
//!   -> diff_filter           (drop lockfiles, bundles, images, ...)
//!   -> prompt                (system + user messages)
//!   -> inference             (chat-completions call)
//! ```
//!
//! [`dispatcher::WebhookDispatcher`] drives one delivery through these stages.
//! Every external collaborator sits behind a trait
//! ([`auth::AuthenticationProvider`], [`client::PullRequestSource`],
//! [`inference::InsightModel`]) so the pipeline can be tested without a
//! network.

pub mod auth;
pub mod client;
pub mod diff_filter;
pub mod dispatcher;
pub mod error;
pub mod inference;
pub mod prompt;
pub mod webhook;

pub use dispatcher::{
    AnalysisReport, DeliveryState, DispatchOutcome, DispatcherConfig, TriggerMode,
    WebhookDispatcher,
};
pub use error::{ApiError, AuthError, DispatchError, InferenceError, ValidationError};
