//! Append-only message log for a single session

use super::message::{Message, NewMessage};
use crate::context::token_estimator::TokenEstimator;
use crate::error::{ContextError, Result};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Ordered, append-only log of messages for one session.
///
/// Sequence numbers start at 1 and increase by one per append, so a message's
/// sequence is also its 1-based position in the log. Readers always get an
/// owned snapshot; an append is never partially visible.
pub struct MemoryStore {
    session_id: String,
    messages: RwLock<Vec<Message>>,
    estimator: Arc<dyn TokenEstimator>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(session_id: impl Into<String>, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: RwLock::new(Vec::new()),
            estimator,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The estimator used to size appended messages
    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    /// Independent copy of the log with the same session and estimator.
    ///
    /// Appends to the copy are invisible here; a caller commits them by
    /// replacing this store with the copy.
    pub fn fork(&self) -> MemoryStore {
        Self {
            session_id: self.session_id.clone(),
            messages: RwLock::new(self.all()),
            estimator: self.estimator.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Message>> {
        self.messages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Message>> {
        self.messages.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and return its sequence number
    pub fn append(&self, message: NewMessage) -> u64 {
        // Estimate outside the lock; tokenizers can be slow on long texts.
        let token_estimate = self.estimator.estimate(&message.content);

        let mut messages = self.write();
        let sequence = messages.len() as u64 + 1;
        let role = message.role;
        messages.push(Message::from_new(message, sequence, token_estimate));

        debug!(
            session_id = %self.session_id,
            sequence,
            role = %role,
            tokens = token_estimate,
            "Appended message"
        );

        sequence
    }

    /// Snapshot of every message in insertion order
    pub fn all(&self) -> Vec<Message> {
        self.read().clone()
    }

    /// The last `k` messages in insertion order (all of them if fewer than `k`)
    pub fn tail(&self, k: usize) -> Vec<Message> {
        let messages = self.read();
        let start = messages.len().saturating_sub(k);
        messages[start..].to_vec()
    }

    /// Messages with a sequence strictly greater than `sequence`
    pub fn since(&self, sequence: u64) -> Vec<Message> {
        let messages = self.read();
        let start = (sequence as usize).min(messages.len());
        messages[start..].to_vec()
    }

    /// Messages with `after < sequence <= up_to`
    pub fn range(&self, after: u64, up_to: u64) -> Vec<Message> {
        let messages = self.read();
        let start = (after as usize).min(messages.len());
        let end = (up_to as usize).min(messages.len());
        if start >= end {
            return Vec::new();
        }
        messages[start..end].to_vec()
    }

    /// Look up a single message
    pub fn get(&self, sequence: u64) -> Option<Message> {
        if sequence == 0 {
            return None;
        }
        self.read().get(sequence as usize - 1).cloned()
    }

    /// Every message currently flagged key, in sequence order
    pub fn key_messages(&self) -> Vec<Message> {
        self.read().iter().filter(|m| m.is_key()).cloned().collect()
    }

    /// Toggle the key flag of an existing message.
    ///
    /// This is the only mutation the store allows after append.
    pub fn set_key(&self, sequence: u64, is_key: bool) -> Result<()> {
        let mut messages = self.write();
        let message = sequence
            .checked_sub(1)
            .and_then(|idx| messages.get_mut(idx as usize))
            .ok_or(ContextError::UnknownSequence(sequence))?;
        message.set_key(is_key);

        debug!(session_id = %self.session_id, sequence, is_key, "Updated key flag");
        Ok(())
    }

    /// Sequence of the newest message, or 0 when empty
    pub fn latest_sequence(&self) -> u64 {
        self.read().len() as u64
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("session_id", &self.session_id)
            .field("len", &self.len())
            .finish()
    }
}
