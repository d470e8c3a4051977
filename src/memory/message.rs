//! Message records for the conversation log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message that has not been appended yet.
///
/// The store assigns the sequence number, timestamp and token estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_key: bool,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_key: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Flag the message as key at append time
    pub fn as_key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

/// One turn in the conversation log.
///
/// Content is immutable once appended. Only the key flag may change, and only
/// through [`MemoryStore::set_key`](super::MemoryStore::set_key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    sequence: u64,
    role: Role,
    content: String,
    is_key: bool,
    token_estimate: usize,
    created_at: DateTime<Utc>,
}

impl Message {
    pub(crate) fn from_new(new: NewMessage, sequence: u64, token_estimate: usize) -> Self {
        Self {
            sequence,
            role: new.role,
            content: new.content,
            is_key: new.is_key,
            token_estimate,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn set_key(&mut self, is_key: bool) {
        self.is_key = is_key;
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn token_estimate(&self) -> usize {
        self.token_estimate
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `role: content` line used when feeding messages to a summarizer
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}
