//! Sliding window over the most recent messages

use crate::context::payload::ContextPayload;
use crate::error::{ContextError, Result};
use crate::memory::MemoryStore;

/// Keeps the last `window_size` messages; older ones are dropped outright
#[derive(Debug, Clone)]
pub struct SlidingWindowStrategy {
    window_size: usize,
}

impl SlidingWindowStrategy {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size < 1 {
            return Err(ContextError::InvalidConfiguration(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { window_size })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        Ok(ContextPayload::from_messages(store.tail(self.window_size)))
    }
}
