//! Per-delivery orchestration.
//!
//! A delivery moves through `received → verified → (ignored | processing) →
//! responded`. Processing runs strictly in sequence: installation token,
//! pull request fetch, diff filtering, prompt assembly, model call and
//! response interpretation. Any stage failure ends the delivery with a
//! [`DispatchError`]; nothing is retried. Every delivery ends in `responded`,
//! whether it was processed, ignored or rejected.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn, Span};

use crate::auth::AuthenticationProvider;
use crate::client::{PullRequestRef, PullRequestSource};
use crate::diff_filter::{DiffFilter, FilteredDiff};
use crate::error::DispatchError;
use crate::inference::InsightModel;
use crate::prompt::{interpret_response, AnalysisOutcome, AnalysisPrompt, PromptBuilder};
use crate::webhook::{PullRequestEvent, SignatureVerifier, WebhookEnvelope};

/// Which pull request activity starts an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// `opened`, `reopened` and `synchronize`.
    #[default]
    PullRequestActivity,
    /// `closed` with the pull request merged.
    Merged,
}

impl TriggerMode {
    /// Whether this event should be analysed under this mode.
    pub fn should_process(&self, event: &PullRequestEvent) -> bool {
        match self {
            Self::PullRequestActivity => {
                matches!(event.action.as_str(), "opened" | "reopened" | "synchronize")
            }
            Self::Merged => event.is_merge(),
        }
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PullRequestActivity => write!(f, "pull_request_activity"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Lifecycle of one delivery, recorded on the tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Received,
    Verified,
    Ignored,
    Processing,
    Responded,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Ignored => "ignored",
            Self::Processing => "processing",
            Self::Responded => "responded",
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline settings shared by every delivery.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub trigger: TriggerMode,
    pub prompt_builder: PromptBuilder,
    pub diff_filter: DiffFilter,
}

/// Everything produced while processing one pull request.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub delivery_id: String,
    pub target: PullRequestRef,
    pub filtered_diff: FilteredDiff,
    pub prompt: AnalysisPrompt,
    pub outcome: AnalysisOutcome,
}

/// Successful end of a delivery.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Acknowledged without analysis.
    Ignored { reason: String },
    /// The pull request was analysed.
    Processed(Box<AnalysisReport>),
}

/// Verifies, filters and processes webhook deliveries.
///
/// Holds only immutable configuration and stateless collaborators, so one
/// instance is shared across all concurrent deliveries.
pub struct WebhookDispatcher {
    verifier: SignatureVerifier,
    auth: Arc<dyn AuthenticationProvider>,
    source: Arc<dyn PullRequestSource>,
    model: Arc<dyn InsightModel>,
    config: DispatcherConfig,
}

impl WebhookDispatcher {
    pub fn new(
        verifier: SignatureVerifier,
        auth: Arc<dyn AuthenticationProvider>,
        source: Arc<dyn PullRequestSource>,
        model: Arc<dyn InsightModel>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            verifier,
            auth,
            source,
            model,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle one delivery end to end.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the signature header does not match the body
    /// - `MalformedPayload` if a verified body is not a pull request event
    /// - `Credential`, `UpstreamFetch` or `Inference` if a processing stage fails
    #[instrument(
        skip(self, envelope),
        fields(
            delivery_id = %envelope.delivery_id(),
            event = envelope.event_type().unwrap_or("<none>"),
            state = DeliveryState::Received.as_str(),
        )
    )]
    pub async fn dispatch(
        &self,
        envelope: &WebhookEnvelope,
    ) -> Result<DispatchOutcome, DispatchError> {
        let result = self.run(envelope).await;
        record_state(DeliveryState::Responded);
        result
    }

    async fn run(&self, envelope: &WebhookEnvelope) -> Result<DispatchOutcome, DispatchError> {
        if !self.verifier.verify(envelope.body(), envelope.signature()) {
            warn!("Rejected delivery with invalid signature");
            return Err(DispatchError::InvalidSignature);
        }
        record_state(DeliveryState::Verified);

        if envelope.is_foreign_event() {
            return Ok(ignore(format!(
                "event type '{}' is not analysed",
                envelope.event_type().unwrap_or_default()
            )));
        }

        let event = PullRequestEvent::parse(envelope.body())?;

        if !self.config.trigger.should_process(&event) {
            return Ok(ignore(format!(
                "action '{}' (merged: {}) does not match trigger '{}'",
                event.action, event.pull_request.merged, self.config.trigger
            )));
        }

        record_state(DeliveryState::Processing);
        let report = self.process(envelope.delivery_id(), &event).await?;

        Ok(DispatchOutcome::Processed(Box::new(report)))
    }

    #[instrument(
        skip(self, event),
        fields(
            action = %event.action,
            pull_request = %event.target(),
            installation_id = %event.installation_id(),
        )
    )]
    async fn process(
        &self,
        delivery_id: &str,
        event: &PullRequestEvent,
    ) -> Result<AnalysisReport, DispatchError> {
        let target = event.target();

        let token = self.auth.installation_token(event.installation_id()).await?;
        let snapshot = self.source.fetch_pull_request(&token, &target).await?;
        drop(token);

        let filtered_diff = self.config.diff_filter.filter(&snapshot.diff);
        debug!(
            kept = filtered_diff.kept_files().len(),
            excluded = filtered_diff.excluded_files().len(),
            unclassified = filtered_diff.unclassified_blocks(),
            "Filtered diff"
        );

        let prompt = self
            .config
            .prompt_builder
            .build(&snapshot, filtered_diff.as_str());

        let raw = self.model.complete(&prompt).await?;
        let outcome = interpret_response(prompt.kind(), raw);
        log_outcome(&outcome);

        Ok(AnalysisReport {
            delivery_id: delivery_id.to_string(),
            target,
            filtered_diff,
            prompt,
            outcome,
        })
    }
}

fn record_state(state: DeliveryState) {
    Span::current().record("state", state.as_str());
    debug!(state = %state, "Delivery state changed");
}

fn ignore(reason: String) -> DispatchOutcome {
    record_state(DeliveryState::Ignored);
    info!(reason = %reason, "Delivery ignored");
    DispatchOutcome::Ignored { reason }
}

fn log_outcome(outcome: &AnalysisOutcome) {
    match outcome {
        AnalysisOutcome::Summary(text) => {
            info!(analysis = %text, "Pull request summary produced");
        }
        AnalysisOutcome::Review(score) => {
            info!(
                total = score.total(),
                review = %serde_json::to_string(score).unwrap_or_default(),
                "Pull request review score produced"
            );
        }
        AnalysisOutcome::Unstructured { raw, .. } => {
            info!(analysis = %raw, "Pull request analysis produced without structure");
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
