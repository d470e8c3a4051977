//! Conversation log
//!
//! The store is the ground truth history of a session. Strategies read from it
//! to build payloads but never delete from it.

pub mod message;
pub mod store;

pub use message::{Message, NewMessage, Role};
pub use store::MemoryStore;
