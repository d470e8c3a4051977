//! Rolling summary of the whole history

use super::rolling::RollingSummary;
use super::TurnUpdate;
use crate::context::payload::ContextPayload;
use crate::error::Result;
use crate::memory::MemoryStore;

/// Summary of everything covered so far plus every message after it
#[derive(Debug)]
pub struct RecursiveSummaryStrategy {
    rolling: RollingSummary,
}

impl RecursiveSummaryStrategy {
    pub fn new(rolling: RollingSummary) -> Self {
        Self { rolling }
    }

    pub fn rolling(&self) -> &RollingSummary {
        &self.rolling
    }

    pub fn reset(&mut self) {
        self.rolling.reset();
    }

    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        let uncovered = store.since(self.rolling.covers());
        Ok(ContextPayload::with_summary(self.rolling.summary(), uncovered))
    }

    /// Folds every uncovered message once the trigger fires
    pub async fn on_turn_complete(&mut self, store: &MemoryStore) -> Result<TurnUpdate> {
        let uncovered = store.since(self.rolling.covers());
        let Some(last) = uncovered.last().map(|m| m.sequence()) else {
            return Ok(TurnUpdate::Unchanged);
        };
        self.rolling
            .maybe_fold(&uncovered, &uncovered, last, store.estimator().as_ref())
            .await
    }
}
