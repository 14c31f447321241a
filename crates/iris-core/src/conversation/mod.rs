//! Conversation domain module.
//!
//! - `message`: `Message` and `MessageRole`
//! - `model`: `ConversationState` aggregate, metadata and metrics
//! - `sink`: `ConversationSink` persistence trait

mod message;
mod model;
mod sink;

pub use message::{Message, MessageRole};
pub use model::{ConversationMetadata, ConversationMetrics, ConversationState};
pub use sink::{ConversationSink, NoOpConversationSink};
