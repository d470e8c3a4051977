//! Rolling summary that preserves key messages

use super::rolling::RollingSummary;
use super::TurnUpdate;
use crate::context::payload::{ContextPayload, ContextUnit};
use crate::error::Result;
use crate::memory::{MemoryStore, Message};
use std::collections::BTreeSet;

/// Summary of ordinary history, every key message verbatim, then the
/// uncovered ordinary messages.
///
/// Key messages are never handed to the summarizer. Coverage still moves past
/// them so the summary boundary stays a single sequence number, and the
/// sequences skipped that way are retained: such a message stays verbatim in
/// the payload even if it is unflagged later, because the summary never saw it.
#[derive(Debug)]
pub struct SummaryKeyStrategy {
    rolling: RollingSummary,
    retained: BTreeSet<u64>,
}

impl SummaryKeyStrategy {
    pub fn new(rolling: RollingSummary) -> Self {
        Self {
            rolling,
            retained: BTreeSet::new(),
        }
    }

    pub fn rolling(&self) -> &RollingSummary {
        &self.rolling
    }

    /// Covered sequences that were skipped by the summarizer
    pub fn retained(&self) -> &BTreeSet<u64> {
        &self.retained
    }

    pub fn reset(&mut self) {
        self.rolling.reset();
        self.retained.clear();
    }

    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        let summary = self.rolling.summary();
        let covers = self.rolling.covers();
        let (verbatim, uncovered): (Vec<Message>, Vec<Message>) = store
            .all()
            .into_iter()
            .filter(|m| {
                m.is_key() || m.sequence() > covers || self.retained.contains(&m.sequence())
            })
            .partition(|m| m.is_key() || m.sequence() <= covers);

        let mut units = Vec::new();
        if !summary.is_empty() {
            units.push(ContextUnit::Summary(summary.clone()));
        }
        units.extend(verbatim.into_iter().map(ContextUnit::Message));
        units.extend(uncovered.into_iter().map(ContextUnit::Message));
        Ok(ContextPayload::new(units))
    }

    /// The trigger counts every uncovered message; only ordinary ones are folded
    pub async fn on_turn_complete(&mut self, store: &MemoryStore) -> Result<TurnUpdate> {
        let uncovered = store.since(self.rolling.covers());
        let Some(last) = uncovered.last().map(|m| m.sequence()) else {
            return Ok(TurnUpdate::Unchanged);
        };
        let (kept, foldable): (Vec<Message>, Vec<Message>) =
            uncovered.iter().cloned().partition(Message::is_key);
        let update = self
            .rolling
            .maybe_fold(&uncovered, &foldable, last, store.estimator().as_ref())
            .await?;
        if matches!(update, TurnUpdate::Summarized { .. }) {
            self.retained.extend(kept.iter().map(Message::sequence));
        }
        Ok(update)
    }
}
