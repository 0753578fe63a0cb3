// Pull request metadata and diff retrieval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{GitHubClient, PullRequestSource, ACCEPT_DIFF, ACCEPT_JSON};
use crate::auth::InstallationToken;
use crate::error::ApiError;

/// Identifies one pull request: `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// `owner/repo` form.
    pub fn full_repository_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// User reference on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestUser {
    pub login: String,
}

/// Branch reference on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestBranch {
    /// Branch name
    #[serde(rename = "ref")]
    pub branch_ref: String,

    /// Commit SHA
    pub sha: String,
}

/// GitHub pull request, as returned by `GET /repos/{owner}/{repo}/pulls/{n}`.
///
/// Only the fields the analysis uses are modelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number (repository-specific)
    pub number: u64,

    /// Pull request title
    pub title: String,

    /// Pull request body content (Markdown)
    pub body: Option<String>,

    /// Pull request state
    pub state: String, // "open", "closed"

    /// User who created the pull request
    pub user: PullRequestUser,

    /// Head branch information
    pub head: PullRequestBranch,

    /// Base branch information
    pub base: PullRequestBranch,

    #[serde(default)]
    pub merged: bool,

    #[serde(default)]
    pub additions: u64,

    #[serde(default)]
    pub deletions: u64,

    #[serde(default)]
    pub changed_files: u64,
}

/// Everything the prompt needs about one pull request, captured at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub number: u64,
    pub title: String,
    /// Pull request body; an absent body becomes the empty string.
    pub description: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    /// Full unified diff as returned by GitHub.
    pub diff: String,
}

impl PullRequestSnapshot {
    /// Combine fetched metadata with the diff text.
    pub fn from_parts(pull_request: PullRequest, diff: String) -> Self {
        Self {
            number: pull_request.number,
            title: pull_request.title,
            description: pull_request.body.unwrap_or_default(),
            author: pull_request.user.login,
            base_branch: pull_request.base.branch_ref,
            head_branch: pull_request.head.branch_ref,
            additions: pull_request.additions,
            deletions: pull_request.deletions,
            changed_files: pull_request.changed_files,
            diff,
        }
    }
}

impl GitHubClient {
    /// Get pull request metadata.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure, non-2xx status or an
    /// unparseable body.
    pub async fn get_pull_request(
        &self,
        token: &InstallationToken,
        target: &PullRequestRef,
    ) -> Result<PullRequest, ApiError> {
        let url = self.pull_request_url(target);
        let response = self.get_with_accept(&url, token, ACCEPT_JSON).await?;

        let text = response.text().await?;
        let pull_request = serde_json::from_str::<PullRequest>(&text)?;

        Ok(pull_request)
    }

    /// Get the pull request rendered as a unified diff.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or non-2xx status.
    pub async fn get_pull_request_diff(
        &self,
        token: &InstallationToken,
        target: &PullRequestRef,
    ) -> Result<String, ApiError> {
        let url = self.pull_request_url(target);
        let response = self.get_with_accept(&url, token, ACCEPT_DIFF).await?;

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self, token), fields(pull_request = %target))]
    async fn fetch_pull_request(
        &self,
        token: &InstallationToken,
        target: &PullRequestRef,
    ) -> Result<PullRequestSnapshot, ApiError> {
        let pull_request = self.get_pull_request(token, target).await?;
        let diff = self.get_pull_request_diff(token, target).await?;

        debug!(
            diff_bytes = diff.len(),
            changed_files = pull_request.changed_files,
            "Fetched pull request"
        );

        Ok(PullRequestSnapshot::from_parts(pull_request, diff))
    }
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
