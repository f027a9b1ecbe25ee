//! Marketing summaries generated from crawled page text.

pub mod language;
pub mod prompt;
pub mod validate;

use crate::completion::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use crate::config::Config;
use thiserror::Error;

pub use language::{Language, cjk_ratio, detect_language};
pub use prompt::{MAX_INPUT_CHARS, Prompt, build_prompt, truncate_chars};
pub use validate::{Rejection, RefusalPhraseValidator, SummaryValidator};

/// Errors raised while producing a summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Completion provider failed to answer.
    #[error("Summary generation failed: {0}")]
    Completion(#[from] CompletionError),
    /// Model answered, but the reply was empty or a refusal.
    #[error("Invalid summary: {0}")]
    Invalid(Rejection),
}

/// Sampling settings for the summary completion.
#[derive(Debug, Clone)]
pub struct SummarySettings {
    /// Chat model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl SummarySettings {
    /// Read the summary settings from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.summary_model.clone(),
            temperature: config.summary_temperature,
            max_tokens: config.summary_max_tokens,
        }
    }
}

/// Turns page text into a validated marketing summary.
pub struct Summarizer<'a> {
    client: &'a dyn CompletionClient,
    validator: &'a dyn SummaryValidator,
    settings: &'a SummarySettings,
}

impl<'a> Summarizer<'a> {
    /// Bind a completion client, validator, and settings for one or more summaries.
    pub fn new(
        client: &'a dyn CompletionClient,
        validator: &'a dyn SummaryValidator,
        settings: &'a SummarySettings,
    ) -> Self {
        Self {
            client,
            validator,
            settings,
        }
    }

    /// Summarize `markdown`, truncating it to [`MAX_INPUT_CHARS`] first.
    pub async fn summarize(&self, markdown: &str) -> Result<String, SummaryError> {
        let text = truncate_chars(markdown, MAX_INPUT_CHARS);
        let language = detect_language(text);
        let prompt = build_prompt(language, text);
        tracing::debug!(
            ?language,
            input_chars = text.chars().count(),
            model = %self.settings.model,
            "Requesting summary"
        );

        let summary = self
            .client
            .complete(CompletionRequest {
                model: self.settings.model.clone(),
                messages: vec![ChatMessage::system(prompt.system), ChatMessage::user(prompt.user)],
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            })
            .await?;

        if let Err(rejection) = self.validator.validate(&summary) {
            tracing::warn!(reason = %rejection, "Rejected model summary");
            return Err(SummaryError::Invalid(rejection));
        }
        Ok(summary)
    }
}
