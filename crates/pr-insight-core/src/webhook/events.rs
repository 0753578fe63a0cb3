//! Typed `pull_request` webhook payload.
//!
//! Only the fields the pipeline consumes are modelled; everything else in the
//! payload is ignored. Parsing happens immediately after the signature check.

use serde::Deserialize;

use crate::auth::InstallationId;
use crate::client::PullRequestRef;
use crate::error::DispatchError;

/// A `pull_request` webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Activity type: `opened`, `closed`, `synchronize`, ...
    pub action: String,
    pub pull_request: PullRequestPayload,
    pub repository: RepositoryPayload,
    pub installation: InstallationPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    /// API URL of the pull request, informational only
    #[serde(default)]
    pub url: Option<String>,
    pub number: u64,
    #[serde(default)]
    pub merged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPayload {
    pub name: String,
    pub owner: OwnerPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerPayload {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationPayload {
    pub id: InstallationId,
}

impl PullRequestEvent {
    /// Parse a verified webhook body.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::MalformedPayload` if the body is not JSON or
    /// lacks a required field.
    pub fn parse(body: &[u8]) -> Result<Self, DispatchError> {
        serde_json::from_slice(body).map_err(|e| DispatchError::MalformedPayload {
            message: e.to_string(),
        })
    }

    /// The pull request this event refers to.
    pub fn target(&self) -> PullRequestRef {
        PullRequestRef::new(
            self.repository.owner.login.clone(),
            self.repository.name.clone(),
            self.pull_request.number,
        )
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation.id
    }

    /// `closed` with the pull request merged.
    pub fn is_merge(&self) -> bool {
        self.action == "closed" && self.pull_request.merged
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
