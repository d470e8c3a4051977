//! Language model collaborator
//!
//! The memory core only needs one call: turn a payload into an assistant
//! reply. Provider plumbing lives behind [`ModelClient`].

pub mod openai;

use crate::context::ContextPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::{ChatCompletionsClient, ModelConfig, OpenAiChatClient};

/// Token usage reported by the provider for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Assistant reply produced by a model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Model client trait for chat completion providers
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce the assistant reply for a payload
    async fn complete(&self, payload: &ContextPayload) -> Result<ModelReply, ModelError>;
}

/// Model call errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model call timed out")]
    Timeout,

    #[error("Model returned no choices")]
    EmptyResponse,
}
