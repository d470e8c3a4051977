//! Memory strategies
//!
//! A strategy decides which part of the conversation log reaches the model.
//! Every variant answers the same two questions: what the payload looks like
//! right now ([`MemoryStrategy::build_context`]), and what bookkeeping to do
//! once a turn has been appended ([`MemoryStrategy::on_turn_complete`]).
//!
//! Strategies never mutate the log. The summarizing variants own a
//! [`RollingSummary`] that only advances after a successful summarizer call.

pub mod buffer;
pub mod config;
pub mod key_selector;
pub mod recursive_summary;
pub mod rolling;
pub mod sliding_window;
pub mod summary_key;
pub mod summary_window;
pub mod trigger;

pub use buffer::BufferStrategy;
pub use config::{StrategyConfig, StrategySection};
pub use key_selector::{classifier_from_keywords, KeyMessageClassifier, KeywordClassifier, ManualFlagOnly};
pub use recursive_summary::RecursiveSummaryStrategy;
pub use rolling::RollingSummary;
pub use sliding_window::SlidingWindowStrategy;
pub use summary_key::SummaryKeyStrategy;
pub use summary_window::SummaryWindowStrategy;
pub use trigger::SummaryTrigger;

use crate::context::payload::ContextPayload;
use crate::context::summarizer::Summarizer;
use crate::context::summary::Summary;
use crate::context::token_budget::TokenBudgetManager;
use crate::error::Result;
use crate::memory::MemoryStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// What a strategy did after a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnUpdate {
    /// Nothing to do, or the trigger was not reached
    Unchanged,
    /// A new summary version replaced the previous one
    Summarized {
        version: u64,
        covers_up_to_sequence: u64,
        folded: usize,
    },
    /// The summarizer failed; the previous summary is still in use
    SummarizationDeferred { reason: String },
}

/// Collaborators needed to build a strategy from configuration
#[derive(Clone)]
pub struct StrategyDeps {
    pub summarizer: Arc<dyn Summarizer>,
    pub budget: TokenBudgetManager,
    pub summarizer_timeout: Duration,
}

/// The configured strategy for one session
#[derive(Debug)]
pub enum MemoryStrategy {
    Buffer(BufferStrategy),
    SlidingWindow(SlidingWindowStrategy),
    RecursiveSummary(RecursiveSummaryStrategy),
    SummaryWindow(SummaryWindowStrategy),
    SummaryKey(SummaryKeyStrategy),
}

impl MemoryStrategy {
    pub fn from_config(config: &StrategyConfig, deps: &StrategyDeps) -> Result<Self> {
        config.validate()?;
        let rolling = |trigger: SummaryTrigger| {
            RollingSummary::new(deps.summarizer.clone(), trigger, deps.summarizer_timeout)
        };

        let strategy = match *config {
            StrategyConfig::Buffer => {
                MemoryStrategy::Buffer(BufferStrategy::new(deps.budget.context_budget()))
            }
            StrategyConfig::SlidingWindow { window_size } => {
                MemoryStrategy::SlidingWindow(SlidingWindowStrategy::new(window_size)?)
            }
            StrategyConfig::RecursiveSummary { trigger } => {
                MemoryStrategy::RecursiveSummary(RecursiveSummaryStrategy::new(rolling(trigger)))
            }
            StrategyConfig::RecursiveSummaryWindow {
                window_size,
                trigger,
            } => MemoryStrategy::SummaryWindow(SummaryWindowStrategy::new(
                window_size,
                rolling(trigger),
            )?),
            StrategyConfig::RecursiveSummaryKey { trigger } => {
                MemoryStrategy::SummaryKey(SummaryKeyStrategy::new(rolling(trigger)))
            }
        };
        Ok(strategy)
    }

    /// Assemble the payload for the next model call. Read-only.
    pub fn build_context(&self, store: &MemoryStore) -> Result<ContextPayload> {
        match self {
            MemoryStrategy::Buffer(s) => s.build_context(store),
            MemoryStrategy::SlidingWindow(s) => s.build_context(store),
            MemoryStrategy::RecursiveSummary(s) => s.build_context(store),
            MemoryStrategy::SummaryWindow(s) => s.build_context(store),
            MemoryStrategy::SummaryKey(s) => s.build_context(store),
        }
    }

    /// Post-append bookkeeping, possibly calling the summarizer.
    ///
    /// On error the strategy state is exactly what it was before the call.
    pub async fn on_turn_complete(&mut self, store: &MemoryStore) -> Result<TurnUpdate> {
        match self {
            MemoryStrategy::Buffer(_) | MemoryStrategy::SlidingWindow(_) => Ok(TurnUpdate::Unchanged),
            MemoryStrategy::RecursiveSummary(s) => s.on_turn_complete(store).await,
            MemoryStrategy::SummaryWindow(s) => s.on_turn_complete(store).await,
            MemoryStrategy::SummaryKey(s) => s.on_turn_complete(store).await,
        }
    }

    /// Current summary, for the variants that keep one
    pub fn summary(&self) -> Option<&Summary> {
        self.rolling().map(RollingSummary::summary)
    }

    fn rolling(&self) -> Option<&RollingSummary> {
        match self {
            MemoryStrategy::Buffer(_) | MemoryStrategy::SlidingWindow(_) => None,
            MemoryStrategy::RecursiveSummary(s) => Some(s.rolling()),
            MemoryStrategy::SummaryWindow(s) => Some(s.rolling()),
            MemoryStrategy::SummaryKey(s) => Some(s.rolling()),
        }
    }

    /// Forget any summary state
    pub fn reset(&mut self) {
        match self {
            MemoryStrategy::Buffer(_) | MemoryStrategy::SlidingWindow(_) => {}
            MemoryStrategy::RecursiveSummary(s) => s.reset(),
            MemoryStrategy::SummaryWindow(s) => s.reset(),
            MemoryStrategy::SummaryKey(s) => s.reset(),
        }
    }

    /// Canonical name, used as a metrics label
    pub fn name(&self) -> &'static str {
        match self {
            MemoryStrategy::Buffer(_) => "buffer",
            MemoryStrategy::SlidingWindow(_) => "sliding_window",
            MemoryStrategy::RecursiveSummary(_) => "recursive_summary",
            MemoryStrategy::SummaryWindow(_) => "recursive_summary_window",
            MemoryStrategy::SummaryKey(_) => "recursive_summary_key",
        }
    }

    /// Whether the payload is guaranteed to stay within the budget.
    ///
    /// Only the buffer enforces its limit; the others bound the payload by
    /// construction and may still exceed it with very long messages.
    pub fn enforces_budget(&self) -> bool {
        matches!(self, MemoryStrategy::Buffer(_))
    }
}
