//! In-process fakes shared by the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use conversation_memory::context::{ContextPayload, Summarizer, SummarizerError, WordBasedEstimator};
use conversation_memory::memory::{MemoryStore, Message, NewMessage};
use conversation_memory::model::{ModelClient, ModelError, ModelReply, TokenUsage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store whose token estimate is exactly the word count
pub fn word_store() -> MemoryStore {
    MemoryStore::new("test", Arc::new(WordBasedEstimator::new(1.0)))
}

pub fn append_users(store: &MemoryStore, n: usize) {
    for _ in 0..n {
        let next = store.latest_sequence() + 1;
        store.append(NewMessage::user(format!("msg{}", next)));
    }
}

/// Records every call and returns a deterministic summary of the sequences seen
#[derive(Default)]
pub struct RecordingSummarizer {
    calls: Mutex<Vec<(String, Vec<u64>)>>,
    fail: AtomicBool,
}

impl RecordingSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(String, Vec<u64>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(
        &self,
        prior_summary: &str,
        new_messages: &[Message],
    ) -> Result<String, SummarizerError> {
        let sequences: Vec<u64> = new_messages.iter().map(Message::sequence).collect();
        self.calls
            .lock()
            .unwrap()
            .push((prior_summary.to_string(), sequences.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SummarizerError::ApiError("provider unavailable".to_string()));
        }
        Ok(format!("{} | folded {:?}", prior_summary, sequences))
    }
}

/// Never answers within any reasonable timeout
pub struct StalledSummarizer;

#[async_trait]
impl Summarizer for StalledSummarizer {
    async fn summarize(&self, _prior: &str, _new: &[Message]) -> Result<String, SummarizerError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }
}

/// Replies with a fixed text and reports usage; can be switched to fail
#[derive(Default)]
pub struct ScriptedModel {
    calls: AtomicUsize,
    fail: AtomicBool,
    payload_sizes: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payload_sizes(&self) -> Vec<usize> {
        self.payload_sizes.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, payload: &ContextPayload) -> Result<ModelReply, ModelError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.payload_sizes.lock().unwrap().push(payload.len());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ModelError::ApiError("HTTP 503".to_string()));
        }
        Ok(ModelReply {
            content: format!("reply {}", n),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
                total_tokens: 12,
            }),
        })
    }
}

/// Never answers within any reasonable timeout
pub struct StalledModel;

#[async_trait]
impl ModelClient for StalledModel {
    async fn complete(&self, _payload: &ContextPayload) -> Result<ModelReply, ModelError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ModelReply::text("too late"))
    }
}
