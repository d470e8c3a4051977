//! Unbounded buffer

use crate::context::payload::ContextPayload;
use crate::error::{ContextError, Result};
use crate::memory::MemoryStore;
use crate::metrics::METRICS;
use tracing::warn;

/// Sends the entire history every turn.
///
/// Lossless, and the only strategy that refuses to build an over-budget
/// payload.
#[derive(Debug, Clone)]
pub struct BufferStrategy {
    limit: usize,
}

impl BufferStrategy {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        let payload = ContextPayload::from_messages(store.all());
        let needed = payload.total_token_estimate();
        if needed > self.limit {
            warn!(
                session_id = %store.session_id(),
                needed,
                limit = self.limit,
                "Buffer exceeds context budget"
            );
            METRICS.context_overflows.with_label_values(&["buffer"]).inc();
            return Err(ContextError::ContextOverflow {
                needed,
                limit: self.limit,
            });
        }
        Ok(payload)
    }
}
