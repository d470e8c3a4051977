//! Conversation memory for LLM chatbots
//!
//! Decides, on every turn, which part of an unbounded conversation reaches the
//! model under a fixed token budget. The log ([`memory::MemoryStore`]) keeps
//! every message; a [`strategy::MemoryStrategy`] turns it into a bounded
//! [`context::ContextPayload`], optionally folding older history into a
//! rolling [`context::Summary`]. [`session::SessionController`] runs the turn
//! loop around both.
//!
//! ```no_run
//! use conversation_memory::prelude::*;
//!
//! # async fn run() -> conversation_memory::Result<()> {
//! let config = Config::load(Some("convmem.toml"))?;
//! let registry = SessionRegistry::new(SessionSettings::from_config(&config)?);
//! let session = registry.get_or_create(&new_session_id(), &config.memory.strategy)?;
//! let outcome = session.run_turn("Hi, I'm planning a trip to Lisbon").await?;
//! println!("{}", outcome.reply);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod session;
pub mod strategy;

pub use error::{ContextError, Result};

pub mod prelude {
    pub use crate::config::{Config, MemoryConfig, SummarizerBackend};
    pub use crate::context::{
        ContextPayload, ContextUnit, Summarizer, Summary, TokenBudgetConfig, TokenBudgetManager,
        TokenEstimator,
    };
    pub use crate::error::{ContextError, Result};
    pub use crate::memory::{MemoryStore, Message, NewMessage, Role};
    pub use crate::model::{ModelClient, ModelReply};
    pub use crate::session::{
        new_session_id, MemorySnapshot, SessionController, SessionRegistry, SessionSettings,
        TurnOutcome,
    };
    pub use crate::strategy::{MemoryStrategy, StrategyConfig, SummaryTrigger, TurnUpdate};
}
