//! Rolling summary behind a verbatim window

use super::rolling::RollingSummary;
use super::TurnUpdate;
use crate::context::payload::ContextPayload;
use crate::error::{ContextError, Result};
use crate::memory::{MemoryStore, Message};

/// Summary of older history plus the last `window_size` messages verbatim.
///
/// A message that has left the window but has not been folded yet is pending:
/// it is in neither part of the payload until the next successful
/// summarization covers it.
#[derive(Debug)]
pub struct SummaryWindowStrategy {
    window_size: usize,
    rolling: RollingSummary,
}

impl SummaryWindowStrategy {
    pub fn new(window_size: usize, rolling: RollingSummary) -> Result<Self> {
        if window_size < 1 {
            return Err(ContextError::InvalidConfiguration(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            window_size,
            rolling,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn rolling(&self) -> &RollingSummary {
        &self.rolling
    }

    pub fn reset(&mut self) {
        self.rolling.reset();
    }

    /// Last sequence outside the window, 0 while everything fits in it
    fn window_boundary(&self, store: &MemoryStore) -> u64 {
        store
            .latest_sequence()
            .saturating_sub(self.window_size as u64)
    }

    /// Messages outside the window and not yet covered by the summary
    pub fn pending(&self, store: &MemoryStore) -> Vec<Message> {
        store.range(self.rolling.covers(), self.window_boundary(store))
    }

    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        Ok(ContextPayload::with_summary(
            self.rolling.summary(),
            store.tail(self.window_size),
        ))
    }

    pub async fn on_turn_complete(&mut self, store: &MemoryStore) -> Result<TurnUpdate> {
        let boundary = self.window_boundary(store);
        let pending = store.range(self.rolling.covers(), boundary);
        if pending.is_empty() {
            return Ok(TurnUpdate::Unchanged);
        }
        self.rolling
            .maybe_fold(&pending, &pending, boundary, store.estimator().as_ref())
            .await
    }
}
