//! Session orchestration

pub mod controller;
pub mod registry;
pub mod usage;

pub use controller::{MemorySnapshot, SessionController, SessionSettings, TurnOutcome};
pub use registry::{new_session_id, session_key, SessionRegistry};
pub use usage::{UsageSummary, UsageTracker};
