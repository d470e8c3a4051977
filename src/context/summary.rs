//! Rolling summary value

use serde::{Deserialize, Serialize};

/// Compressed representation of the older part of a conversation.
///
/// A summary is never edited in place. Each successful summarizer run
/// produces a new value through [`Summary::advance`], with a higher version
/// and a coverage boundary that never moves backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    text: String,
    covers_up_to_sequence: u64,
    version: u64,
    token_estimate: usize,
}

impl Summary {
    /// The empty summary a session starts with
    pub fn empty() -> Self {
        Self::default()
    }

    /// Next version of this summary.
    ///
    /// `covers_up_to_sequence` is clamped so coverage is monotonically
    /// non-decreasing.
    pub fn advance(&self, text: String, covers_up_to_sequence: u64, token_estimate: usize) -> Self {
        Self {
            text,
            covers_up_to_sequence: covers_up_to_sequence.max(self.covers_up_to_sequence),
            version: self.version + 1,
            token_estimate,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Last message sequence folded into this summary
    pub fn covers_up_to_sequence(&self) -> u64 {
        self.covers_up_to_sequence
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn token_estimate(&self) -> usize {
        self.token_estimate
    }

    /// True until the first summarization produces text
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
