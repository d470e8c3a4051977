//! Context payloads handed to the model

use super::summary::Summary;
use crate::memory::{Message, Role};
use serde::{Deserialize, Serialize};

/// Header placed before summary text when rendering for the model
pub const SUMMARY_HEADER: &str = "Summary of the conversation so far:";

/// One piece of a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContextUnit {
    Summary(Summary),
    Message(Message),
}

impl ContextUnit {
    pub fn token_estimate(&self) -> usize {
        match self {
            ContextUnit::Summary(summary) => summary.token_estimate(),
            ContextUnit::Message(message) => message.token_estimate(),
        }
    }
}

/// Role/content pair in the shape chat-completion APIs expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered context for one model call. Rebuilt every turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPayload {
    units: Vec<ContextUnit>,
    total_token_estimate: usize,
}

impl ContextPayload {
    pub fn new(units: Vec<ContextUnit>) -> Self {
        let total_token_estimate = units.iter().map(ContextUnit::token_estimate).sum();
        Self {
            units,
            total_token_estimate,
        }
    }

    /// Payload of raw messages only
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self::new(messages.into_iter().map(ContextUnit::Message).collect())
    }

    /// Summary unit (when non-empty) followed by the given messages
    pub fn with_summary(summary: &Summary, messages: Vec<Message>) -> Self {
        let mut units = Vec::with_capacity(messages.len() + 1);
        if !summary.is_empty() {
            units.push(ContextUnit::Summary(summary.clone()));
        }
        units.extend(messages.into_iter().map(ContextUnit::Message));
        Self::new(units)
    }

    pub fn units(&self) -> &[ContextUnit] {
        &self.units
    }

    pub fn total_token_estimate(&self) -> usize {
        self.total_token_estimate
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The summary unit, if the payload carries one
    pub fn summary(&self) -> Option<&Summary> {
        self.units.iter().find_map(|unit| match unit {
            ContextUnit::Summary(summary) => Some(summary),
            ContextUnit::Message(_) => None,
        })
    }

    /// Raw messages in payload order
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.units.iter().filter_map(|unit| match unit {
            ContextUnit::Message(message) => Some(message),
            ContextUnit::Summary(_) => None,
        })
    }

    /// Sequences of the raw messages in payload order
    pub fn sequences(&self) -> Vec<u64> {
        self.messages().map(Message::sequence).collect()
    }

    /// Render as chat messages, optionally led by a system prompt
    pub fn to_chat_messages(&self, system_prompt: Option<&str>) -> Vec<ChatMessage> {
        let mut chat = Vec::with_capacity(self.units.len() + 1);
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            chat.push(ChatMessage {
                role: Role::System,
                content: prompt.to_string(),
            });
        }
        for unit in &self.units {
            chat.push(match unit {
                ContextUnit::Summary(summary) => ChatMessage {
                    role: Role::System,
                    content: format!("{}\n{}", SUMMARY_HEADER, summary.text()),
                },
                ContextUnit::Message(message) => ChatMessage {
                    role: message.role(),
                    content: message.content().to_string(),
                },
            });
        }
        chat
    }
}
