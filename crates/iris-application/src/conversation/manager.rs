//! Conversation manager.
//!
//! Keeps the bounded set of conversations, forwards user messages to the
//! inference session manager and turns finished generations into assistant
//! messages before handing each event on to the caller.

use super::metrics::MetricCounters;
use crate::inference::InferenceSessionManager;
use futures::StreamExt;
use iris_core::config::ConversationConfig;
use iris_core::conversation::{
    ConversationMetadata, ConversationMetrics, ConversationSink, ConversationState, Message,
};
use iris_core::inference::{GenerationParameters, InferenceEvent, InferenceStream};
use iris_core::{IrisError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

type ConversationCell = Arc<Mutex<ConversationState>>;

struct ConversationEntry {
    /// Creation order; breaks `created_at` ties during eviction.
    sequence: u64,
    cell: ConversationCell,
}

pub struct ConversationManager {
    inference: Arc<InferenceSessionManager>,
    sink: Arc<dyn ConversationSink>,
    config: ConversationConfig,
    default_parameters: GenerationParameters,
    conversations: RwLock<HashMap<String, ConversationEntry>>,
    next_sequence: AtomicU64,
    metrics: Arc<MetricCounters>,
}

impl ConversationManager {
    pub fn new(
        inference: Arc<InferenceSessionManager>,
        sink: Arc<dyn ConversationSink>,
        config: ConversationConfig,
        default_parameters: GenerationParameters,
    ) -> Self {
        Self {
            inference,
            sink,
            config,
            default_parameters,
            conversations: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
            metrics: Arc::new(MetricCounters::default()),
        }
    }

    /// Creates a conversation, evicting the oldest-created one at the ceiling.
    pub async fn create_conversation(&self, title: Option<String>) -> Result<ConversationMetadata> {
        let state = ConversationState::new(title.unwrap_or_else(|| self.config.default_title.clone()));
        let metadata = state.metadata.clone();

        let evicted = {
            let mut conversations = self.conversations.write().await;
            let mut evicted = Vec::new();
            while !conversations.is_empty() && conversations.len() >= self.config.max_conversations.max(1) {
                let Some(oldest) = oldest_conversation(&conversations).await else {
                    break;
                };
                if let Some(entry) = conversations.remove(&oldest) {
                    evicted.push((oldest, entry.cell));
                }
            }
            let entry = ConversationEntry {
                sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                cell: Arc::new(Mutex::new(state)),
            };
            conversations.insert(metadata.id.clone(), entry);
            evicted
        };

        for (id, cell) in evicted {
            self.metrics.conversation_evicted();
            self.release(&id, &cell).await;
            tracing::info!(target: "conversation", conversation_id = %id, "Evicted oldest conversation");
        }

        spawn_persist(self.sink.clone(), None, metadata.clone());
        tracing::debug!(target: "conversation", conversation_id = %metadata.id, "Created conversation");
        Ok(metadata)
    }

    /// Sends a user message and streams the assistant's reply.
    ///
    /// Capability failures (no model, busy session) are returned before the
    /// user message is recorded. Every inference event is re-emitted unchanged
    /// after the conversation has been updated for it.
    ///
    /// The conversation stays locked from session binding until the user
    /// message is recorded, so concurrent sends share one session.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        params: Option<GenerationParameters>,
    ) -> Result<InferenceStream> {
        let cell = self.conversation(conversation_id).await?;
        let user_message = Message::user(text);
        let (events, metadata) = {
            let mut state = cell.lock().await;
            let session_id = self.inference.ensure_session(conversation_id).await?;
            let events = self
                .inference
                .generate_response(&session_id, text, params.unwrap_or(self.default_parameters))
                .await?;

            state.session_id = Some(session_id);
            let trimmed = state.push_message(user_message.clone(), self.config.max_messages_per_conversation);
            self.metrics.messages_trimmed(trimmed);
            (events, state.metadata.clone())
        };
        self.metrics.message_sent();
        spawn_persist(self.sink.clone(), Some(user_message), metadata);

        let tracker = GenerationTracker {
            bookkeeper: Arc::new(Bookkeeper {
                conversation: cell,
                sink: self.sink.clone(),
                metrics: self.metrics.clone(),
                max_messages: self.config.max_messages_per_conversation,
                finished: AtomicBool::new(false),
            }),
        };
        let stream = events.then(move |event| {
            let bookkeeper = tracker.bookkeeper.clone();
            async move {
                bookkeeper.record(&event).await;
                event
            }
        });
        Ok(Box::pin(stream))
    }

    /// Empties history and counters and detaches the session.
    pub async fn clear_conversation(&self, conversation_id: &str) -> Result<()> {
        let cell = self.conversation(conversation_id).await?;
        let (session_id, metadata) = {
            let mut state = cell.lock().await;
            state.clear();
            (state.session_id.take(), state.metadata.clone())
        };
        if let Some(session_id) = session_id {
            self.inference.close_session(&session_id).await;
        }
        spawn_persist(self.sink.clone(), None, metadata);
        tracing::debug!(target: "conversation", conversation_id, "Cleared conversation");
        Ok(())
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let cell = self
            .conversations
            .write()
            .await
            .remove(conversation_id)
            .map(|entry| entry.cell)
            .ok_or_else(|| IrisError::not_found("conversation", conversation_id))?;
        self.release(conversation_id, &cell).await;
        tracing::debug!(target: "conversation", conversation_id, "Deleted conversation");
        Ok(())
    }

    pub async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let cell = self.conversation(conversation_id).await?;
        let state = cell.lock().await;
        Ok(state.message_list())
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Option<ConversationMetadata> {
        let cell = self.conversation(conversation_id).await.ok()?;
        let state = cell.lock().await;
        Some(state.metadata.clone())
    }

    /// All conversations, most recently modified first.
    pub async fn get_all_conversations(&self) -> Vec<ConversationMetadata> {
        let cells: Vec<ConversationCell> = self
            .conversations
            .read()
            .await
            .values()
            .map(|entry| entry.cell.clone())
            .collect();
        let mut all = Vec::with_capacity(cells.len());
        for cell in cells {
            all.push(cell.lock().await.metadata.clone());
        }
        all.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        all
    }

    pub fn metrics(&self) -> ConversationMetrics {
        self.metrics.snapshot()
    }

    async fn conversation(&self, conversation_id: &str) -> Result<ConversationCell> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .map(|entry| entry.cell.clone())
            .ok_or_else(|| IrisError::not_found("conversation", conversation_id))
    }

    /// Closes the session of a removed conversation and notifies the sink.
    async fn release(&self, conversation_id: &str, cell: &ConversationCell) {
        let session_id = cell.lock().await.session_id.take();
        if let Some(session_id) = session_id {
            self.inference.close_session(&session_id).await;
        }

        let sink = self.sink.clone();
        let conversation_id = conversation_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = sink.remove_conversation(&conversation_id).await {
                tracing::warn!(target: "conversation", "Failed to remove persisted conversation: {}", e);
            }
        });
    }
}

/// Earliest `created_at`, then lowest creation sequence.
async fn oldest_conversation(conversations: &HashMap<String, ConversationEntry>) -> Option<String> {
    let mut oldest: Option<(String, (chrono::DateTime<chrono::Utc>, u64))> = None;
    for (id, entry) in conversations {
        let key = (entry.cell.lock().await.metadata.created_at, entry.sequence);
        if oldest.as_ref().is_none_or(|(_, best)| key < *best) {
            oldest = Some((id.clone(), key));
        }
    }
    oldest.map(|(id, _)| id)
}

/// Hands finalized data to the sink without waiting for it.
fn spawn_persist(
    sink: Arc<dyn ConversationSink>,
    message: Option<Message>,
    metadata: ConversationMetadata,
) {
    tokio::spawn(async move {
        if let Some(message) = message {
            if let Err(e) = sink.persist_message(&metadata.id, &message).await {
                tracing::warn!(target: "conversation", "Failed to persist message: {}", e);
            }
        }
        if let Err(e) = sink.persist_metadata(&metadata).await {
            tracing::warn!(target: "conversation", "Failed to persist conversation metadata: {}", e);
        }
    });
}

/// Applies the effect of each inference event to its conversation.
struct Bookkeeper {
    conversation: ConversationCell,
    sink: Arc<dyn ConversationSink>,
    metrics: Arc<MetricCounters>,
    max_messages: usize,
    finished: AtomicBool,
}

impl Bookkeeper {
    async fn record(&self, event: &InferenceEvent) {
        match event {
            InferenceEvent::GenerationCompleted {
                text,
                token_count,
                processing_time_ms,
            } => {
                let message = Message::assistant(text.clone(), *token_count, *processing_time_ms);
                let metadata = {
                    let mut state = self.conversation.lock().await;
                    let trimmed = state.push_message(message.clone(), self.max_messages);
                    self.metrics.messages_trimmed(trimmed);
                    state.metadata.clone()
                };
                self.metrics
                    .generation_completed(*token_count, *processing_time_ms);
                spawn_persist(self.sink.clone(), Some(message), metadata);
            }
            InferenceEvent::SafetyViolation { stage, reason } => {
                tracing::info!(target: "conversation", stage = %stage, "Safety violation: {}", reason);
                self.metrics.safety_violation();
            }
            InferenceEvent::Error { message } => {
                tracing::warn!(target: "conversation", "Generation error: {}", message);
                self.metrics.generation_error();
            }
            InferenceEvent::GenerationStarted { .. } | InferenceEvent::TokenGenerated { .. } => {}
        }
        if event.is_terminal() {
            self.finished.store(true, Ordering::Release);
        }
    }
}

/// Counts a generation as cancelled if its stream is dropped before the terminal event.
struct GenerationTracker {
    bookkeeper: Arc<Bookkeeper>,
}

impl Drop for GenerationTracker {
    fn drop(&mut self) {
        if !self.bookkeeper.finished.load(Ordering::Acquire) {
            self.bookkeeper.metrics.generation_cancelled();
            tracing::debug!(target: "conversation", "Generation cancelled before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_equal_creation_times_evict_lowest_sequence() {
        let created_at = Utc::now();
        for first in 0..8u64 {
            let mut conversations = HashMap::new();
            for offset in 0..8u64 {
                let sequence = (first + offset) % 8;
                let mut state = ConversationState::new(format!("c{sequence}"));
                state.metadata.created_at = created_at;
                conversations.insert(
                    format!("conv-{sequence}"),
                    ConversationEntry {
                        sequence,
                        cell: Arc::new(Mutex::new(state)),
                    },
                );
            }
            assert_eq!(
                oldest_conversation(&conversations).await.as_deref(),
                Some("conv-0")
            );
        }
    }

    #[tokio::test]
    async fn test_earlier_creation_wins_over_sequence() {
        let now = Utc::now();
        let mut conversations = HashMap::new();
        for (sequence, age_secs) in [(0u64, 0i64), (1, 60)] {
            let mut state = ConversationState::new("c");
            state.metadata.created_at = now - chrono::Duration::seconds(age_secs);
            conversations.insert(
                format!("conv-{sequence}"),
                ConversationEntry {
                    sequence,
                    cell: Arc::new(Mutex::new(state)),
                },
            );
        }
        assert_eq!(
            oldest_conversation(&conversations).await.as_deref(),
            Some("conv-1")
        );
    }
}
