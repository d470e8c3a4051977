//! One conversation: store, strategy and the turn loop around them

use super::usage::{UsageSummary, UsageTracker};
use crate::config::{Config, SummarizerBackend};
use crate::context::payload::ContextPayload;
use crate::context::summarizer::{ConcatenationSummarizer, LLMSummarizer, Summarizer};
use crate::context::summary::Summary;
use crate::context::token_budget::TokenBudgetManager;
use crate::context::token_estimator::{TokenEstimator, WordBasedEstimator};
use crate::error::{ContextError, Result};
use crate::memory::{MemoryStore, Message, NewMessage};
use crate::metrics::METRICS;
use crate::model::{ModelClient, ModelError, ModelReply, OpenAiChatClient, TokenUsage};
use crate::strategy::{
    classifier_from_keywords, KeyMessageClassifier, ManualFlagOnly, MemoryStrategy,
    StrategyConfig, StrategyDeps, TurnUpdate,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every session built from the same configuration
#[derive(Clone)]
pub struct SessionSettings {
    pub model: Arc<dyn ModelClient>,
    pub summarizer: Arc<dyn Summarizer>,
    pub estimator: Arc<dyn TokenEstimator>,
    pub classifier: Arc<dyn KeyMessageClassifier>,
    pub budget: TokenBudgetManager,
    pub model_timeout: Duration,
    pub summarizer_timeout: Duration,
}

impl SessionSettings {
    /// Word-based estimation, manual key flagging, default budget and timeouts
    pub fn new(model: Arc<dyn ModelClient>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            model,
            summarizer,
            estimator: Arc::new(WordBasedEstimator::default()),
            classifier: Arc::new(ManualFlagOnly),
            budget: TokenBudgetManager::default(),
            model_timeout: Duration::from_secs(60),
            summarizer_timeout: Duration::from_secs(30),
        }
    }

    /// Build the HTTP-backed collaborators described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let model: Arc<dyn ModelClient> = Arc::new(
            OpenAiChatClient::new(config.model.clone())
                .map_err(|e| ContextError::InvalidConfiguration(e.to_string()))?,
        );
        let summarizer: Arc<dyn Summarizer> = match config.memory.summarizer_backend {
            SummarizerBackend::Llm => Arc::new(
                LLMSummarizer::new(config.summarizer.clone())
                    .map_err(|e| ContextError::InvalidConfiguration(e.to_string()))?,
            ),
            SummarizerBackend::Concatenation => Arc::new(ConcatenationSummarizer),
        };
        let budget = TokenBudgetManager::new(config.token_budget.clone())
            .map_err(|e| ContextError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            model,
            summarizer,
            estimator: config.memory.estimator.build()?,
            classifier: classifier_from_keywords(&config.memory.key_keywords),
            budget,
            model_timeout: config.model.timeout(),
            summarizer_timeout: config.summarizer.timeout(),
        })
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn KeyMessageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_budget(mut self, budget: TokenBudgetManager) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_timeouts(mut self, model_timeout: Duration, summarizer_timeout: Duration) -> Self {
        self.model_timeout = model_timeout;
        self.summarizer_timeout = summarizer_timeout;
        self
    }

    fn strategy_deps(&self) -> StrategyDeps {
        StrategyDeps {
            summarizer: self.summarizer.clone(),
            budget: self.budget.clone(),
            summarizer_timeout: self.summarizer_timeout,
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub user_sequence: u64,
    pub assistant_sequence: u64,
    pub payload_tokens: usize,
    pub usage: TokenUsage,
    pub update: TurnUpdate,
}

/// Serializable view of a session for display layers
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub session_id: String,
    pub strategy: String,
    pub message_count: usize,
    pub summary: Option<Summary>,
    /// What would be sent on the next call
    pub next_payload: Option<ContextPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_error: Option<String>,
    pub usage: UsageSummary,
}

struct SessionState {
    store: MemoryStore,
    strategy: MemoryStrategy,
}

/// Runs turns for one session.
///
/// The store and strategy sit behind a single async mutex held for the whole
/// turn, so a second turn waits until the first has appended its reply and
/// finished any summarization.
pub struct SessionController {
    session_id: String,
    strategy_label: String,
    state: Mutex<SessionState>,
    settings: SessionSettings,
    usage: UsageTracker,
}

impl SessionController {
    pub fn new(
        session_id: impl Into<String>,
        strategy: &StrategyConfig,
        settings: SessionSettings,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let store = MemoryStore::new(session_id.clone(), settings.estimator.clone());
        let strategy_label = strategy.label();
        let strategy = MemoryStrategy::from_config(strategy, &settings.strategy_deps())?;

        info!(session_id = %session_id, strategy = %strategy_label, "Session created");

        Ok(Self {
            session_id,
            strategy_label,
            state: Mutex::new(SessionState { store, strategy }),
            settings,
            usage: UsageTracker::new(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn strategy_label(&self) -> &str {
        &self.strategy_label
    }

    pub fn usage(&self) -> UsageSummary {
        self.usage.summary()
    }

    fn classify(&self, mut message: NewMessage) -> NewMessage {
        if !message.is_key && self.settings.classifier.is_key(&message) {
            debug!(session_id = %self.session_id, "Classifier flagged message as key");
            message.is_key = true;
        }
        message
    }

    /// Append a message outside of a model turn
    pub async fn append(&self, message: NewMessage) -> u64 {
        let message = self.classify(message);
        let state = self.state.lock().await;
        state.store.append(message)
    }

    /// Payload the next model call would receive
    pub async fn build_context(&self) -> Result<ContextPayload> {
        let state = self.state.lock().await;
        state.strategy.build_context(&state.store)
    }

    /// Run one full turn for a user message.
    ///
    /// The user message and the reply are committed to the log together, and
    /// only once the model has answered. A turn that fails before that point
    /// (overflow, model error or timeout) leaves the log exactly as it was. A
    /// failed summarization does not fail the turn; it is reported as
    /// [`TurnUpdate::SummarizationDeferred`] and retried on the next turn.
    pub async fn run_turn(&self, user_input: impl Into<String>) -> Result<TurnOutcome> {
        let start = Instant::now();
        let mut state = self.state.lock().await;
        let strategy_name = state.strategy.name();

        let result = self.turn(&mut state, user_input.into()).await;
        METRICS.record_turn(strategy_name, result.is_ok(), start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            error!(session_id = %self.session_id, error = %e, "Turn failed");
        }
        result
    }

    async fn turn(&self, state: &mut SessionState, user_input: String) -> Result<TurnOutcome> {
        let draft = state.store.fork();
        let user_sequence = draft.append(self.classify(NewMessage::user(user_input)));

        let payload = state.strategy.build_context(&draft)?;
        let payload_tokens = payload.total_token_estimate();
        let budget = self.settings.budget.context_budget();
        METRICS.record_payload(state.strategy.name(), payload_tokens, budget);
        if let Err(e) = self.settings.budget.check_budget(payload_tokens) {
            warn!(
                session_id = %self.session_id,
                strategy = state.strategy.name(),
                error = %e,
                "Payload exceeds context budget"
            );
        }
        debug!(
            session_id = %self.session_id,
            units = payload.len(),
            payload_tokens,
            remaining = self.settings.budget.remaining(payload_tokens),
            "Built context payload"
        );

        let reply = self.call_model(&payload).await?;
        let usage = reply.usage.unwrap_or_else(|| {
            let completion = self.settings.estimator.estimate(&reply.content) as u64;
            TokenUsage {
                prompt_tokens: payload_tokens as u64,
                completion_tokens: completion,
                total_tokens: payload_tokens as u64 + completion,
            }
        });
        self.usage.record(&usage);

        let assistant_sequence =
            draft.append(self.classify(NewMessage::assistant(reply.content.clone())));
        state.store = draft;

        let update = match state.strategy.on_turn_complete(&state.store).await {
            Ok(update) => update,
            Err(ContextError::SummarizationFailed(e)) => TurnUpdate::SummarizationDeferred {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };

        Ok(TurnOutcome {
            reply: reply.content,
            user_sequence,
            assistant_sequence,
            payload_tokens,
            usage,
            update,
        })
    }

    async fn call_model(&self, payload: &ContextPayload) -> Result<ModelReply> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.model_timeout,
            self.settings.model.complete(payload),
        )
        .await
        .unwrap_or(Err(ModelError::Timeout));
        METRICS.record_model_call(outcome.is_ok(), start.elapsed().as_secs_f64());

        outcome.map_err(|e| {
            warn!(session_id = %self.session_id, error = %e, "Model call failed");
            ContextError::ModelCallFailed(e)
        })
    }

    /// Flag or unflag a message as key.
    ///
    /// Flagging a message the summary already covers adds it verbatim; its
    /// earlier contribution to the summary text stays. Unflagging a key
    /// message the summary skipped keeps it verbatim, since it was never
    /// summarized.
    pub async fn mark_key(&self, sequence: u64, is_key: bool) -> Result<()> {
        let state = self.state.lock().await;
        state.store.set_key(sequence, is_key)
    }

    /// Full log in insertion order
    pub async fn history(&self) -> Vec<Message> {
        self.state.lock().await.store.all()
    }

    pub async fn summary(&self) -> Option<Summary> {
        self.state.lock().await.strategy.summary().cloned()
    }

    /// Start over with an empty log; sequences restart at 1
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let discarded = state.store.len();
        state.store = MemoryStore::new(self.session_id.clone(), self.settings.estimator.clone());
        state.strategy.reset();
        self.usage.reset();
        info!(session_id = %self.session_id, discarded, "Session reset");
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.lock().await;
        let (next_payload, payload_error) = match state.strategy.build_context(&state.store) {
            Ok(payload) => (Some(payload), None),
            Err(e) => (None, Some(e.to_string())),
        };
        MemorySnapshot {
            session_id: self.session_id.clone(),
            strategy: self.strategy_label.clone(),
            message_count: state.store.len(),
            summary: state.strategy.summary().cloned(),
            next_payload,
            payload_error,
            usage: self.usage.summary(),
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("strategy", &self.strategy_label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl ModelClient for EchoModel {
        async fn complete(&self, payload: &ContextPayload) -> std::result::Result<ModelReply, ModelError> {
            Ok(ModelReply::text(format!("seen {}", payload.len())))
        }
    }

    fn controller(strategy: StrategyConfig) -> SessionController {
        let settings = SessionSettings::new(Arc::new(EchoModel), Arc::new(ConcatenationSummarizer));
        SessionController::new("abc12345", &strategy, settings).unwrap()
    }

    #[tokio::test]
    async fn test_run_turn_appends_both_messages() {
        let session = controller(StrategyConfig::SlidingWindow { window_size: 4 });
        let outcome = session.run_turn("hello").await.unwrap();

        assert_eq!(outcome.user_sequence, 1);
        assert_eq!(outcome.assistant_sequence, 2);
        assert_eq!(outcome.reply, "seen 1");
        assert_eq!(outcome.update, TurnUpdate::Unchanged);
        assert_eq!(session.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_usage_falls_back_to_estimates() {
        let session = controller(StrategyConfig::Buffer);
        session.run_turn("one two three").await.unwrap();

        let usage = session.usage();
        assert_eq!(usage.successful_requests, 1);
        assert_eq!(usage.prompt_tokens, 4);
        assert!(usage.completion_tokens > 0);
    }

    #[tokio::test]
    async fn test_reset_restarts_sequences() {
        let session = controller(StrategyConfig::RecursiveSummary {
            trigger: crate::strategy::SummaryTrigger::every(2),
        });
        session.run_turn("first").await.unwrap();
        assert!(session.summary().await.is_some_and(|s| !s.is_empty()));

        session.reset().await;
        assert!(session.history().await.is_empty());
        assert!(session.summary().await.is_some_and(|s| s.is_empty()));
        assert_eq!(session.append(NewMessage::user("again")).await, 1);
        assert_eq!(session.usage(), UsageSummary::default());
    }

    #[tokio::test]
    async fn test_snapshot_reports_overflow() {
        let settings = SessionSettings::new(Arc::new(EchoModel), Arc::new(ConcatenationSummarizer))
            .with_budget(
                TokenBudgetManager::new(crate::context::TokenBudgetConfig::with_limit(3)).unwrap(),
            );
        let session = SessionController::new("s", &StrategyConfig::Buffer, settings).unwrap();
        session
            .append(NewMessage::user("a message that is far too long"))
            .await;

        let snapshot = session.snapshot().await;
        assert!(snapshot.next_payload.is_none());
        assert!(snapshot.payload_error.unwrap().contains("Context overflow"));
        assert_eq!(snapshot.message_count, 1);
    }

    #[tokio::test]
    async fn test_mark_key_unknown_sequence() {
        let session = controller(StrategyConfig::Buffer);
        assert!(matches!(
            session.mark_key(3, true).await,
            Err(ContextError::UnknownSequence(3))
        ));
    }
}
