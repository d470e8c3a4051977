//! Key-message classification

use crate::memory::NewMessage;
use std::sync::Arc;

/// Decides whether a message should be exempt from summarization.
///
/// Invoked once per message, before it is appended. It therefore sees a
/// [`NewMessage`] rather than a stored message: the flag has to be settled
/// before the message gets its sequence, since the store never rewrites a
/// message apart from later manual flagging. A message already flagged
/// manually stays key regardless of the classifier's answer.
pub trait KeyMessageClassifier: Send + Sync {
    fn is_key(&self, message: &NewMessage) -> bool;
}

/// Manual flagging only; never promotes a message on its own
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualFlagOnly;

impl KeyMessageClassifier for ManualFlagOnly {
    fn is_key(&self, _message: &NewMessage) -> bool {
        false
    }
}

/// Flags messages containing any of a set of keywords (case-insensitive)
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }
}

impl KeyMessageClassifier for KeywordClassifier {
    fn is_key(&self, message: &NewMessage) -> bool {
        let content = message.content.to_lowercase();
        self.keywords.iter().any(|k| content.contains(k.as_str()))
    }
}

/// Keyword classifier when keywords are configured, manual flagging otherwise
pub fn classifier_from_keywords(keywords: &[String]) -> Arc<dyn KeyMessageClassifier> {
    if keywords.iter().all(|k| k.trim().is_empty()) {
        Arc::new(ManualFlagOnly)
    } else {
        Arc::new(KeywordClassifier::new(keywords))
    }
}
