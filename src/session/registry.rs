//! Keyed collection of live sessions

use super::controller::{SessionController, SessionSettings};
use crate::error::Result;
use crate::strategy::StrategyConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Short random session id: the first 8 hex characters of a v4 UUID
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Registry key for a session under a given strategy.
///
/// The strategy label carries its parameters, so the same session id under a
/// different window size gets its own independent memory.
pub fn session_key(session_id: &str, strategy: &StrategyConfig) -> String {
    format!("{}_{}", session_id, strategy.label())
}

/// Sessions keyed by `"{session_id}_{strategy label}"`.
///
/// Sessions share no mutable state; the map only hands out `Arc`s.
pub struct SessionRegistry {
    settings: SessionSettings,
    sessions: DashMap<String, Arc<SessionController>>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: DashMap::new(),
        }
    }

    /// Existing session for this id and strategy, or a fresh one
    pub fn get_or_create(
        &self,
        session_id: &str,
        strategy: &StrategyConfig,
    ) -> Result<Arc<SessionController>> {
        let key = session_key(session_id, strategy);
        match self.sessions.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let controller = Arc::new(SessionController::new(
                    session_id,
                    strategy,
                    self.settings.clone(),
                )?);
                info!(key = %entry.key(), "Registered session");
                entry.insert(controller.clone());
                Ok(controller)
            }
        }
    }

    pub fn get(&self, session_id: &str, strategy: &StrategyConfig) -> Option<Arc<SessionController>> {
        self.sessions
            .get(&session_key(session_id, strategy))
            .map(|entry| entry.value().clone())
    }

    /// Reset one session's memory in place. Returns false if it does not exist.
    pub async fn clear(&self, session_id: &str, strategy: &StrategyConfig) -> bool {
        match self.get(session_id, strategy) {
            Some(controller) => {
                controller.reset().await;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_id: &str, strategy: &StrategyConfig) -> Option<Arc<SessionController>> {
        self.sessions
            .remove(&session_key(session_id, strategy))
            .map(|(_, controller)| controller)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys of all live sessions, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::summarizer::ConcatenationSummarizer;
    use crate::context::ContextPayload;
    use crate::memory::NewMessage;
    use crate::model::{ModelClient, ModelError, ModelReply};
    use async_trait::async_trait;

    struct FixedModel;

    #[async_trait]
    impl ModelClient for FixedModel {
        async fn complete(&self, _payload: &ContextPayload) -> std::result::Result<ModelReply, ModelError> {
            Ok(ModelReply::text("ok"))
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionSettings::new(
            Arc::new(FixedModel),
            Arc::new(ConcatenationSummarizer),
        ))
    }

    #[test]
    fn test_new_session_id_shape() {
        let id = new_session_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_session_id());
    }

    #[test]
    fn test_session_key_includes_window() {
        let key = session_key("abcd1234", &StrategyConfig::SlidingWindow { window_size: 3 });
        assert_eq!(key, "abcd1234_sliding_window(3)");
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_session() {
        let registry = registry();
        let strategy = StrategyConfig::Buffer;
        let first = registry.get_or_create("s1", &strategy).unwrap();
        first.append(NewMessage::user("hi")).await;

        let again = registry.get_or_create("s1", &strategy).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_strategies_are_isolated() {
        let registry = registry();
        let small = StrategyConfig::SlidingWindow { window_size: 2 };
        let large = StrategyConfig::SlidingWindow { window_size: 5 };

        registry
            .get_or_create("s1", &small)
            .unwrap()
            .append(NewMessage::user("only in small"))
            .await;
        let other = registry.get_or_create("s1", &large).unwrap();

        assert!(other.history().await.is_empty());
        assert_eq!(registry.keys().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let registry = registry();
        let strategy = StrategyConfig::Buffer;
        let session = registry.get_or_create("s1", &strategy).unwrap();
        session.run_turn("hello").await.unwrap();

        assert!(registry.clear("s1", &strategy).await);
        assert!(session.history().await.is_empty());
        assert!(!registry.clear("missing", &strategy).await);

        assert!(registry.remove("s1", &strategy).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_strategy_not_registered() {
        let registry = registry();
        let result = registry.get_or_create("s1", &StrategyConfig::SlidingWindow { window_size: 0 });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
