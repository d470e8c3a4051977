//! When the rolling summary is refreshed

use crate::error::{ContextError, Result};
use crate::memory::Message;
use serde::{Deserialize, Serialize};

/// Summarization trigger.
///
/// Fires when the uncovered candidate messages reach `every_messages` in
/// number, or their combined token estimate reaches `token_threshold`.
/// Either bound may be left unset, but not both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_messages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_threshold: Option<usize>,
}

impl Default for SummaryTrigger {
    /// One user/assistant exchange
    fn default() -> Self {
        Self::every(2)
    }
}

impl SummaryTrigger {
    pub fn every(messages: usize) -> Self {
        Self {
            every_messages: Some(messages),
            token_threshold: None,
        }
    }

    pub fn tokens(threshold: usize) -> Self {
        Self {
            every_messages: None,
            token_threshold: Some(threshold),
        }
    }

    pub fn every_or_tokens(messages: usize, threshold: usize) -> Self {
        Self {
            every_messages: Some(messages),
            token_threshold: Some(threshold),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match (self.every_messages, self.token_threshold) {
            (None, None) => Err(ContextError::InvalidConfiguration(
                "summary trigger needs every_messages or token_threshold".to_string(),
            )),
            (Some(0), _) => Err(ContextError::InvalidConfiguration(
                "summary trigger every_messages must be at least 1".to_string(),
            )),
            (_, Some(0)) => Err(ContextError::InvalidConfiguration(
                "summary trigger token_threshold must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether the accumulated candidates warrant a summarizer call
    pub fn should_fire(&self, candidates: &[Message]) -> bool {
        if candidates.is_empty() {
            return false;
        }
        let by_count = self
            .every_messages
            .map(|n| candidates.len() >= n)
            .unwrap_or(false);
        let by_tokens = self
            .token_threshold
            .map(|t| candidates.iter().map(Message::token_estimate).sum::<usize>() >= t)
            .unwrap_or(false);
        by_count || by_tokens
    }

    /// Compact description for labels and logs
    pub fn describe(&self) -> String {
        match (self.every_messages, self.token_threshold) {
            (Some(n), Some(t)) => format!("{}msgs|{}tok", n, t),
            (Some(n), None) => format!("{}msgs", n),
            (None, Some(t)) => format!("{}tok", t),
            (None, None) => "never".to_string(),
        }
    }
}
