//! Conversation lifecycle and history bookkeeping.

mod manager;
mod metrics;

pub use manager::ConversationManager;
