//! Conversation aggregate.

use super::message::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Conversation summary kept alongside the message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub message_count: usize,
    pub total_tokens: u64,
}

/// In-memory conversation aggregate.
///
/// `metadata.message_count` always equals `messages.len()`; every mutation
/// goes through methods that keep the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub metadata: ConversationMetadata,
    messages: VecDeque<Message>,
    /// Inference session currently bound to this conversation.
    pub session_id: Option<String>,
}

impl ConversationState {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            metadata: ConversationMetadata {
                id: Uuid::new_v4().to_string(),
                title: title.into(),
                created_at: now,
                last_modified: now,
                message_count: 0,
                total_tokens: 0,
            },
            messages: VecDeque::new(),
            session_id: None,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn message_list(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Appends a message and trims the oldest ones beyond `max_messages`.
    ///
    /// Returns the number of trimmed messages.
    pub fn push_message(&mut self, message: Message, max_messages: usize) -> usize {
        if message.role == MessageRole::Assistant {
            self.metadata.total_tokens += u64::from(message.token_count.unwrap_or(0));
        }
        self.messages.push_back(message);

        let mut trimmed = 0;
        while self.messages.len() > max_messages.max(1) {
            self.messages.pop_front();
            trimmed += 1;
        }

        self.metadata.message_count = self.messages.len();
        self.metadata.last_modified = Utc::now();
        trimmed
    }

    /// Empties history and counters. The session binding is left to the caller.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.metadata.message_count = 0;
        self.metadata.total_tokens = 0;
        self.metadata.last_modified = Utc::now();
    }
}

/// Counters kept by the conversation manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetrics {
    pub messages_sent: u64,
    pub completed_generations: u64,
    pub safety_violations: u64,
    pub generation_errors: u64,
    pub cancelled_generations: u64,
    pub generated_tokens: u64,
    pub total_processing_time_ms: u64,
    pub evicted_conversations: u64,
    pub trimmed_messages: u64,
}

impl ConversationMetrics {
    pub fn average_tokens_per_second(&self) -> f64 {
        if self.total_processing_time_ms == 0 {
            return 0.0;
        }
        self.generated_tokens as f64 * 1000.0 / self.total_processing_time_ms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_count_in_step() {
        let mut state = ConversationState::new("t");
        for i in 0..5 {
            state.push_message(Message::user(format!("m{i}")), 3);
        }
        assert_eq!(state.metadata.message_count, 3);
        let contents: Vec<_> = state.messages().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_assistant_tokens_accumulate() {
        let mut state = ConversationState::new("t");
        state.push_message(Message::assistant("a", 12, 100), 10);
        state.push_message(Message::assistant("b", 8, 100), 10);
        assert_eq!(state.metadata.total_tokens, 20);

        state.clear();
        assert_eq!(state.metadata.total_tokens, 0);
        assert_eq!(state.metadata.message_count, 0);
    }

    #[test]
    fn test_average_tokens_per_second() {
        let metrics = ConversationMetrics {
            generated_tokens: 50,
            total_processing_time_ms: 2000,
            ..Default::default()
        };
        assert!((metrics.average_tokens_per_second() - 25.0).abs() < f64::EPSILON);
        assert_eq!(ConversationMetrics::default().average_tokens_per_second(), 0.0);
    }
}
