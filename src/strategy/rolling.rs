//! Rolling summary shared by the summarizing strategies

use super::trigger::SummaryTrigger;
use super::TurnUpdate;
use crate::context::summarizer::{Summarizer, SummarizerError};
use crate::context::summary::Summary;
use crate::context::token_estimator::TokenEstimator;
use crate::error::Result;
use crate::memory::Message;
use crate::metrics::METRICS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Current summary plus the machinery to advance it.
///
/// The summary is only replaced after the summarizer returns successfully.
/// On failure or timeout the previous value stays in place and the same
/// messages are offered again on the next turn.
pub struct RollingSummary {
    summary: Summary,
    summarizer: Arc<dyn Summarizer>,
    trigger: SummaryTrigger,
    timeout: Duration,
}

impl RollingSummary {
    pub fn new(summarizer: Arc<dyn Summarizer>, trigger: SummaryTrigger, timeout: Duration) -> Self {
        Self {
            summary: Summary::empty(),
            summarizer,
            trigger,
            timeout,
        }
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn covers(&self) -> u64 {
        self.summary.covers_up_to_sequence()
    }

    pub fn trigger(&self) -> &SummaryTrigger {
        &self.trigger
    }

    /// Drop the summary, keeping summarizer and trigger
    pub fn reset(&mut self) {
        self.summary = Summary::empty();
    }

    /// Advance the summary if `candidates` satisfy the trigger.
    ///
    /// `to_fold` is what the summarizer sees and may be a subset of
    /// `candidates`; coverage moves to `covers_to` either way. When nothing is
    /// left to fold the text is carried over unchanged.
    pub async fn maybe_fold(
        &mut self,
        candidates: &[Message],
        to_fold: &[Message],
        covers_to: u64,
        estimator: &dyn TokenEstimator,
    ) -> Result<TurnUpdate> {
        if !self.trigger.should_fire(candidates) {
            debug!(
                pending = candidates.len(),
                trigger = %self.trigger.describe(),
                "Summary trigger not reached"
            );
            return Ok(TurnUpdate::Unchanged);
        }

        let text = if to_fold.is_empty() {
            self.summary.text().to_string()
        } else {
            self.summarize(to_fold).await?
        };

        let token_estimate = estimator.estimate(&text);
        let next = self.summary.advance(text, covers_to, token_estimate);

        info!(
            version = next.version(),
            covers_up_to_sequence = next.covers_up_to_sequence(),
            folded = to_fold.len(),
            summary_tokens = token_estimate,
            "Summary advanced"
        );

        let update = TurnUpdate::Summarized {
            version: next.version(),
            covers_up_to_sequence: next.covers_up_to_sequence(),
            folded: to_fold.len(),
        };
        self.summary = next;
        Ok(update)
    }

    async fn summarize(&self, messages: &[Message]) -> Result<String> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.summarizer.summarize(self.summary.text(), messages),
        )
        .await
        .unwrap_or(Err(SummarizerError::Timeout));
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(text) => {
                METRICS.record_summarization("success", elapsed);
                Ok(text)
            }
            Err(e) => {
                let status = if matches!(e, SummarizerError::Timeout) {
                    "timeout"
                } else {
                    "error"
                };
                METRICS.record_summarization(status, elapsed);
                warn!(
                    error = %e,
                    version = self.summary.version(),
                    "Summarizer failed, keeping previous summary"
                );
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for RollingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingSummary")
            .field("summary", &self.summary)
            .field("trigger", &self.trigger)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::summarizer::ConcatenationSummarizer;
    use crate::context::token_estimator::WordBasedEstimator;
    use crate::memory::NewMessage;

    fn message(seq: u64, text: &str) -> Message {
        Message::from_new(NewMessage::user(text), seq, 1)
    }

    fn rolling(every: usize) -> RollingSummary {
        RollingSummary::new(
            Arc::new(ConcatenationSummarizer),
            SummaryTrigger::every(every),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_below_trigger_is_unchanged() {
        let mut rolling = rolling(2);
        let candidates = vec![message(1, "hi")];
        let update = rolling
            .maybe_fold(&candidates, &candidates, 1, &WordBasedEstimator::default())
            .await
            .unwrap();
        assert_eq!(update, TurnUpdate::Unchanged);
        assert_eq!(rolling.summary(), &Summary::empty());
    }

    #[tokio::test]
    async fn test_fold_advances_version_and_coverage() {
        let mut rolling = rolling(1);
        let candidates = vec![message(1, "hi"), message(2, "there")];
        rolling
            .maybe_fold(&candidates, &candidates, 2, &WordBasedEstimator::new(1.0))
            .await
            .unwrap();

        let summary = rolling.summary();
        assert_eq!(summary.text(), "user: hi\nuser: there");
        assert_eq!(summary.version(), 1);
        assert_eq!(summary.covers_up_to_sequence(), 2);
        assert_eq!(summary.token_estimate(), 4);
    }

    #[tokio::test]
    async fn test_nothing_to_fold_carries_text_over() {
        let mut rolling = rolling(1);
        let first = vec![message(1, "hi")];
        rolling
            .maybe_fold(&first, &first, 1, &WordBasedEstimator::default())
            .await
            .unwrap();

        let keys_only = vec![message(2, "key")];
        let update = rolling
            .maybe_fold(&keys_only, &[], 2, &WordBasedEstimator::default())
            .await
            .unwrap();

        assert_eq!(
            update,
            TurnUpdate::Summarized {
                version: 2,
                covers_up_to_sequence: 2,
                folded: 0
            }
        );
        assert_eq!(rolling.summary().text(), "user: hi");
    }

    #[test]
    fn test_reset_drops_summary() {
        let mut rolling = rolling(1);
        let candidates = vec![message(1, "hi")];
        tokio_test::block_on(rolling.maybe_fold(
            &candidates,
            &candidates,
            1,
            &WordBasedEstimator::default(),
        ))
        .unwrap();
        rolling.reset();
        assert!(rolling.summary().is_empty());
        assert_eq!(rolling.covers(), 0);
    }
}
