//! Context payload building blocks
//!
//! Token accounting, the rolling summary value, payload shapes and the
//! summarizer collaborator used by the summary-based strategies.

pub mod payload;
pub mod summarizer;
pub mod summary;
pub mod token_budget;
pub mod token_estimator;

pub use payload::{ChatMessage, ContextPayload, ContextUnit, SUMMARY_HEADER};
pub use summarizer::{ConcatenationSummarizer, LLMSummarizer, Summarizer, SummarizerConfig, SummarizerError};
pub use summary::Summary;
pub use token_budget::{BudgetError, TokenBudgetConfig, TokenBudgetManager};
pub use token_estimator::{EstimatorKind, TiktokenEstimator, TokenEstimator, WordBasedEstimator};
