//! Chat-completion client for OpenAI-compatible APIs.
//!
//! The summarizer only needs a single non-streaming completion, so the client issues
//! `POST {base}/chat/completions` directly with `reqwest` and returns the first choice.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider could not be reached or timed out.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a non-success status.
    #[error("Completion request failed ({status}): {body}")]
    UnexpectedStatus {
        /// Status returned by the provider.
        status: StatusCode,
        /// Body returned alongside the failing status.
        body: String,
    },
    /// Provider response could not be parsed or carried no choices.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Single chat message sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Role of the author (`system` or `user`).
    pub role: &'static str,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Request payload passed to the completion provider.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the assistant text for `request`.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// OpenAI chat-completions client.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client for `api_key` against the configured base URL and timeout.
    pub fn new(config: &Config, api_key: impl Into<String>) -> Result<Self, CompletionError> {
        Self::with_endpoint(&config.openai_base_url, api_key, config.llm_timeout())
    }

    /// Build a client against an explicit base URL.
    pub fn with_endpoint(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("sitebrief/summary")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
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

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let started = std::time::Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                tracing::warn!(error = %error, "Completion request failed to send");
                CompletionError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Completion provider returned error");
            return Err(CompletionError::UnexpectedStatus { status, body });
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::InvalidResponse("response carried no choices".into()))?
            .message
            .content
            .unwrap_or_default();

        tracing::debug!(
            model = %request.model,
            duration_ms = started.elapsed().as_millis() as u64,
            chars = content.chars().count(),
            "Completion received"
        );

        Ok(content.trim().to_string())
    }
}
