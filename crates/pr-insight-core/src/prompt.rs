//! Prompt assembly for the AI collaborator and interpretation of its answer.
//!
//! A prompt is always two messages: a fixed system instruction for the chosen
//! [`AnalysisKind`] and a user message built from the pull request snapshot and
//! the filtered diff.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::PullRequestSnapshot;
use crate::error::ValidationError;

/// Highest score a review dimension may carry.
pub const MAX_SCORE: u8 = 10;

/// Names of the review dimensions, in the order they are requested.
pub const REVIEW_DIMENSIONS: [&str; 5] = [
    "functional_value",
    "technical_complexity",
    "impact_scope",
    "code_quality",
    "risk_control",
];

fn system_prompt(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Summary => include_str!("../prompts/summary.txt"),
        AnalysisKind::ReviewScore => include_str!("../prompts/review_score.txt"),
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered messages sent to the AI collaborator for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    kind: AnalysisKind,
    messages: Vec<PromptMessage>,
}

impl AnalysisPrompt {
    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    /// Content of the first user message.
    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// What the model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Free-form Markdown summary.
    #[default]
    Summary,
    /// Structured five-dimension score as JSON.
    ReviewScore,
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::ReviewScore => write!(f, "review_score"),
        }
    }
}

/// Builds [`AnalysisPrompt`]s.
///
/// # Examples
///
/// ```
/// use pr_insight_core::prompt::{AnalysisKind, PromptBuilder, Role};
/// # use pr_insight_core::client::PullRequestSnapshot;
/// # let snapshot = PullRequestSnapshot {
/// #     number: 1, title: "Fix typo".into(), description: String::new(),
/// #     author: "octocat".into(), base_branch: "main".into(), head_branch: "typo".into(),
/// #     additions: 1, deletions: 1, changed_files: 1, diff: String::new(),
/// # };
///
/// let prompt = PromptBuilder::new(AnalysisKind::Summary).build(&snapshot, "diff --git a/x b/x\n");
/// assert_eq!(prompt.messages()[0].role, Role::System);
/// assert!(prompt.user_content().unwrap().contains("Fix typo"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    kind: AnalysisKind,
    max_diff_chars: Option<usize>,
}

impl PromptBuilder {
    pub fn new(kind: AnalysisKind) -> Self {
        Self {
            kind,
            max_diff_chars: None,
        }
    }

    /// Truncate diffs longer than `limit` characters.
    pub fn with_max_diff_chars(mut self, limit: Option<usize>) -> Self {
        self.max_diff_chars = limit;
        self
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Assemble the system and user messages for one pull request.
    pub fn build(&self, snapshot: &PullRequestSnapshot, filtered_diff: &str) -> AnalysisPrompt {
        let diff = match self.max_diff_chars {
            Some(limit) => truncate_diff(filtered_diff, limit),
            None => Cow::Borrowed(filtered_diff),
        };

        let user = match self.kind {
            AnalysisKind::Summary => summary_user_prompt(snapshot, &diff),
            AnalysisKind::ReviewScore => review_user_prompt(snapshot, &diff),
        };

        AnalysisPrompt {
            kind: self.kind,
            messages: vec![
                PromptMessage::system(system_prompt(self.kind)),
                PromptMessage::user(user),
            ],
        }
    }
}

fn summary_user_prompt(snapshot: &PullRequestSnapshot, diff: &str) -> String {
    let mut prompt = String::from("Summarize the following pull request.\n\n");

    prompt.push_str(&format!("Title: {}\n", snapshot.title));
    prompt.push_str(&format!("Description:\n{}\n", snapshot.description));

    push_diff(&mut prompt, diff);
    prompt
}

fn review_user_prompt(snapshot: &PullRequestSnapshot, diff: &str) -> String {
    let mut prompt = String::from("Assess the following pull request.\n\n");

    prompt.push_str(&format!("Pull request: #{}\n", snapshot.number));
    prompt.push_str(&format!("Title: {}\n", snapshot.title));
    prompt.push_str(&format!("Author: {}\n", snapshot.author));
    prompt.push_str(&format!(
        "Branches: {} -> {}\n",
        snapshot.head_branch, snapshot.base_branch
    ));
    prompt.push_str(&format!(
        "Changes: +{} -{} across {} files\n",
        snapshot.additions, snapshot.deletions, snapshot.changed_files
    ));
    prompt.push_str(&format!("Description:\n{}\n", snapshot.description));

    push_diff(&mut prompt, diff);

    prompt.push_str("\nRespond with a JSON object of exactly this shape:\n{\n");
    for name in REVIEW_DIMENSIONS {
        prompt.push_str(&format!(
            "  \"{}\": {{ \"score\": <integer 0-{}>, \"reason\": \"<why>\" }},\n",
            name, MAX_SCORE
        ));
    }
    prompt.push_str("  \"suggestion\": \"<optional improvement suggestion>\"\n}\n");

    prompt
}

fn push_diff(prompt: &mut String, diff: &str) {
    prompt.push_str("\nDIFF BEGINS:\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("DIFF ENDS\n");
}

/// Cut `diff` to at most `limit` characters, on a char boundary, and append
/// a marker saying how much was dropped.
pub fn truncate_diff(diff: &str, limit: usize) -> Cow<'_, str> {
    let Some((cut, _)) = diff.char_indices().nth(limit) else {
        return Cow::Borrowed(diff);
    };

    let total = diff.chars().count();
    Cow::Owned(format!(
        "{}\n[diff truncated: showing {} of {} characters]\n",
        &diff[..cut],
        limit,
        total
    ))
}

// ============================================================================
// Response interpretation
// ============================================================================

/// Score and rationale for one review dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDimension {
    pub score: u8,
    pub reason: String,
}

/// Structured review requested in [`AnalysisKind::ReviewScore`] mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewScore {
    pub functional_value: ScoreDimension,
    pub technical_complexity: ScoreDimension,
    pub impact_scope: ScoreDimension,
    pub code_quality: ScoreDimension,
    pub risk_control: ScoreDimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ReviewScore {
    /// Dimensions paired with their names, in request order.
    pub fn dimensions(&self) -> [(&'static str, &ScoreDimension); 5] {
        [
            (REVIEW_DIMENSIONS[0], &self.functional_value),
            (REVIEW_DIMENSIONS[1], &self.technical_complexity),
            (REVIEW_DIMENSIONS[2], &self.impact_scope),
            (REVIEW_DIMENSIONS[3], &self.code_quality),
            (REVIEW_DIMENSIONS[4], &self.risk_control),
        ]
    }

    /// Sum of all five scores.
    pub fn total(&self) -> u32 {
        self.dimensions()
            .iter()
            .map(|(_, d)| u32::from(d.score))
            .sum()
    }

    /// Check every score is within `0..=10`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, dimension) in self.dimensions() {
            if dimension.score > MAX_SCORE {
                return Err(ValidationError::OutOfRange {
                    field: name.to_string(),
                    message: format!("score {} exceeds {}", dimension.score, MAX_SCORE),
                });
            }
        }
        Ok(())
    }
}

/// What the model produced, as far as this service can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Markdown summary text.
    Summary(String),
    /// A validated review score.
    Review(ReviewScore),
    /// A review was requested but the answer did not have the expected shape.
    Unstructured { raw: String, reason: String },
}

impl AnalysisOutcome {
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Unstructured { .. })
    }
}

/// Interpret model output for the given analysis kind.
///
/// Unparseable review output is a soft failure: it is returned as
/// [`AnalysisOutcome::Unstructured`] and logged, never raised as an error.
pub fn interpret_response(kind: AnalysisKind, raw: String) -> AnalysisOutcome {
    match kind {
        AnalysisKind::Summary => AnalysisOutcome::Summary(raw),
        AnalysisKind::ReviewScore => match parse_review_score(&raw) {
            Ok(score) => AnalysisOutcome::Review(score),
            Err(reason) => {
                warn!(reason = %reason, "Model response is not a valid review score");
                AnalysisOutcome::Unstructured { raw, reason }
            }
        },
    }
}

fn parse_review_score(raw: &str) -> Result<ReviewScore, String> {
    let json = strip_code_fence(raw);

    let score: ReviewScore = serde_json::from_str(json).map_err(|e| e.to_string())?;
    score.validate().map_err(|e| e.to_string())?;

    Ok(score)
}

/// Remove a surrounding Markdown code fence (```json ... ```), if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.trim_end();
    let inner = rest.strip_suffix("```").unwrap_or(rest);

    // The info string (e.g. "json") runs to the end of the opening fence line,
    // or to the first whitespace when the whole fence sits on one line.
    let inner = inner.trim_start();
    let body = if inner.starts_with(['{', '[']) {
        inner
    } else {
        inner
            .split_once('\n')
            .or_else(|| inner.split_once(char::is_whitespace))
            .map_or("", |(_, body)| body)
    };

    body.trim()
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
