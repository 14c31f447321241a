//! Persistence collaborator for finalized conversation data.

use super::message::Message;
use super::model::ConversationMetadata;
use crate::error::Result;
use async_trait::async_trait;

/// Receives finalized messages and metadata for durable storage.
///
/// The runtime hands data over from a spawned task and never waits for it.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    async fn persist_message(&self, conversation_id: &str, message: &Message) -> Result<()>;

    async fn persist_metadata(&self, metadata: &ConversationMetadata) -> Result<()>;

    async fn remove_conversation(&self, conversation_id: &str) -> Result<()>;
}

/// A no-op sink for when no persistence layer is configured.
pub struct NoOpConversationSink;

#[async_trait]
impl ConversationSink for NoOpConversationSink {
    async fn persist_message(&self, _conversation_id: &str, _message: &Message) -> Result<()> {
        Ok(())
    }

    async fn persist_metadata(&self, _metadata: &ConversationMetadata) -> Result<()> {
        Ok(())
    }

    async fn remove_conversation(&self, _conversation_id: &str) -> Result<()> {
        Ok(())
    }
}
