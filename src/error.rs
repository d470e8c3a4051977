//! Error types for conversation memory management

use crate::context::summarizer::SummarizerError;
use crate::model::ModelError;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors raised while building context payloads or running a turn
#[derive(Debug, Error)]
pub enum ContextError {
    /// Payload does not fit the model's hard limit. Only the buffer strategy
    /// raises this; the caller decides whether to truncate or switch strategy.
    #[error("Context overflow: payload needs {needed} tokens, limit is {limit}")]
    ContextOverflow { needed: usize, limit: usize },

    /// External summarizer call failed. The prior summary is kept.
    #[error("Summarization failed: {0}")]
    SummarizationFailed(#[from] SummarizerError),

    /// External model call failed. No reply message was appended.
    #[error("Model call failed: {0}")]
    ModelCallFailed(#[from] ModelError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration loading failed: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No message with sequence {0}")]
    UnknownSequence(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContextError {
    /// Whether the session can keep going after this error.
    ///
    /// Summarization failures are retried on the next turn and model failures
    /// leave the store untouched, so both are recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ContextError::SummarizationFailed(_) | ContextError::ModelCallFailed(_)
        )
    }

    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ContextError::ContextOverflow { .. } => "context_overflow",
            ContextError::SummarizationFailed(_) => "summarization_failed",
            ContextError::ModelCallFailed(_) => "model_call_failed",
            ContextError::InvalidConfiguration(_) => "invalid_configuration",
            ContextError::Config(_) => "config",
            ContextError::UnknownSequence(_) => "unknown_sequence",
            ContextError::Internal(_) => "internal",
        }
    }
}
