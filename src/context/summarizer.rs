//! LLM-based summarization for the rolling conversation summary

use super::payload::ChatMessage;
use crate::memory::{Message, Role};
use crate::model::openai::ChatCompletionsClient;
use crate::model::ModelError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Summarizer contract: fold new messages into the prior summary.
///
/// Implementations are expected to call an external model and may take
/// arbitrary wall-clock time. They must not keep state between calls.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        prior_summary: &str,
        new_messages: &[Message],
    ) -> Result<String, SummarizerError>;
}

/// Configuration for LLM summarizer
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "crate::model::openai::default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> usize {
    3
}

fn default_max_tokens() -> usize {
    1200
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::model::openai::default_endpoint(),
            api_key: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl SummarizerConfig {
    /// Fill the API key from OPENAI_API_KEY when the config has none
    pub fn from_env(mut self) -> Self {
        if self.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.api_key = Some(SecretString::new(key));
            }
        }
        self
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .map(|k| !k.expose_secret().is_empty())
            .unwrap_or(false)
    }
}

const SUMMARY_INSTRUCTIONS: &str = "Given the existing conversation summary and the new messages, \
generate a new summary of the conversation. Ensure to maintain as much relevant information as possible.";

const NO_PREVIOUS_SUMMARY: &str = "No previous summary";

/// LLM-based summarizer using OpenAI-compatible API
pub struct LLMSummarizer {
    http: ChatCompletionsClient,
    max_tokens: usize,
}

impl LLMSummarizer {
    /// Create a new LLM summarizer
    pub fn new(config: SummarizerConfig) -> Result<Self, SummarizerError> {
        let http = ChatCompletionsClient::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.timeout(),
            config.max_retries,
        )
        .map_err(|e| SummarizerError::InitializationError(e.to_string()))?;

        Ok(Self {
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Build summarization prompt
    fn build_prompt(prior_summary: &str, new_messages: &[Message]) -> String {
        let existing = if prior_summary.trim().is_empty() {
            NO_PREVIOUS_SUMMARY
        } else {
            prior_summary
        };
        let lines = new_messages
            .iter()
            .map(Message::transcript_line)
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Existing conversation summary:\n{}\n\nNew messages:\n{}",
            existing, lines
        )
    }
}

#[async_trait]
impl Summarizer for LLMSummarizer {
    async fn summarize(
        &self,
        prior_summary: &str,
        new_messages: &[Message],
    ) -> Result<String, SummarizerError> {
        if new_messages.is_empty() {
            return Ok(prior_summary.to_string());
        }

        debug!(
            "Summarizing {} messages, target: {} tokens",
            new_messages.len(),
            self.max_tokens
        );

        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: SUMMARY_INSTRUCTIONS.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: Self::build_prompt(prior_summary, new_messages),
            },
        ];

        let completion = self
            .http
            .create(messages, Some(0.3), Some(self.max_tokens))
            .await?;

        debug!("Summarization successful");
        Ok(completion.content)
    }
}

/// Simple concatenation-based summarizer (fallback)
///
/// Deterministic and offline: appends `role: content` lines to the prior
/// summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatenationSummarizer;

#[async_trait]
impl Summarizer for ConcatenationSummarizer {
    async fn summarize(
        &self,
        prior_summary: &str,
        new_messages: &[Message],
    ) -> Result<String, SummarizerError> {
        let mut parts: Vec<String> = Vec::with_capacity(new_messages.len() + 1);
        if !prior_summary.trim().is_empty() {
            parts.push(prior_summary.to_string());
        }
        parts.extend(new_messages.iter().map(Message::transcript_line));
        Ok(parts.join("\n"))
    }
}

/// Summarizer errors
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Summarizer timed out")]
    Timeout,

    #[error("Unknown error")]
    Unknown,
}

impl From<ModelError> for SummarizerError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InitializationError(msg) => SummarizerError::InitializationError(msg),
            ModelError::ApiError(msg) => SummarizerError::ApiError(msg),
            ModelError::NetworkError(msg) => SummarizerError::NetworkError(msg),
            ModelError::Timeout => SummarizerError::Timeout,
            ModelError::EmptyResponse => SummarizerError::ApiError("No choices in response".to_string()),
        }
    }
}
