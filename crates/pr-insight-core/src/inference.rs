//! Client for the AI collaborator.
//!
//! Speaks the OpenAI-compatible chat-completions contract: the prompt's
//! messages are POSTed as `{model, messages}` and the answer is read from
//! `choices[0].message.content`. Gateways that wrap the answer as
//! `{"result": {"response": ...}}` (Workers AI) are accepted as well.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::error::InferenceError;
use crate::prompt::{AnalysisKind, AnalysisPrompt, PromptMessage};

/// Produces model output for an assembled prompt.
#[async_trait]
pub trait InsightModel: Send + Sync {
    /// Send the prompt and return the model's text answer.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` on transport failure, non-2xx status, an
    /// unrecognised response shape or an empty answer.
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, InferenceError>;
}

/// Inference endpoint settings.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Full chat-completions URL.
    pub endpoint_url: String,
    pub model: String,
    /// Request `response_format: json_object` for review-score prompts.
    pub json_response: bool,
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            json_response: false,
            user_agent: "pr-insight".to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompletionResponse {
    Chat { choices: Vec<ChatChoice> },
    Workers { result: WorkersResult },
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkersResult {
    #[serde(default)]
    response: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Chat { choices } => choices.into_iter().next().and_then(|c| c.message.content),
            Self::Workers { result } => result.response,
        }
    }
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatCompletionClient {
    http_client: reqwest::Client,
    config: InferenceConfig,
    api_key: Option<Zeroizing<String>>,
}

impl ChatCompletionClient {
    /// Create a client. `api_key` is sent as a bearer token when present.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::HttpClientError` if the HTTP client cannot be
    /// built.
    pub fn new(
        config: InferenceConfig,
        api_key: Option<Zeroizing<String>>,
    ) -> Result<Self, InferenceError> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("config", &self.config)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[async_trait]
impl InsightModel for ChatCompletionClient {
    #[instrument(skip(self, prompt), fields(model = %self.config.model, kind = %prompt.kind()))]
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, InferenceError> {
        let response_format = (self.config.json_response
            && prompt.kind() == AnalysisKind::ReviewScore)
            .then_some(ResponseFormat {
                format_type: "json_object",
            });

        let request = ChatRequest {
            model: &self.config.model,
            messages: prompt.messages(),
            response_format,
        };

        let mut builder = self.http_client.post(&self.config.endpoint_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.as_str()));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| InferenceError::InvalidResponse {
                message: e.to_string(),
            })?;

        let text = parsed.into_text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        debug!(response_chars = text.len(), "Model answered");
        Ok(text)
    }
}

#[cfg(test)]
#[path = "inference_tests.rs"]
mod tests;
