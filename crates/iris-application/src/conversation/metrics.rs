use iris_core::conversation::ConversationMetrics;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters behind [`ConversationMetrics`].
///
/// Updated from stream bookkeeping and from `Drop`, so they cannot take async locks.
#[derive(Default)]
pub(crate) struct MetricCounters {
    messages_sent: AtomicU64,
    completed_generations: AtomicU64,
    safety_violations: AtomicU64,
    generation_errors: AtomicU64,
    cancelled_generations: AtomicU64,
    generated_tokens: AtomicU64,
    total_processing_time_ms: AtomicU64,
    evicted_conversations: AtomicU64,
    trimmed_messages: AtomicU64,
}

impl MetricCounters {
    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_completed(&self, tokens: u32, processing_time_ms: u64) {
        self.completed_generations.fetch_add(1, Ordering::Relaxed);
        self.generated_tokens.fetch_add(u64::from(tokens), Ordering::Relaxed);
        self.total_processing_time_ms
            .fetch_add(processing_time_ms, Ordering::Relaxed);
    }

    pub fn safety_violation(&self) {
        self.safety_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_error(&self) {
        self.generation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_cancelled(&self) {
        self.cancelled_generations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conversation_evicted(&self) {
        self.evicted_conversations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_trimmed(&self, count: usize) {
        if count > 0 {
            self.trimmed_messages
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ConversationMetrics {
        ConversationMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            completed_generations: self.completed_generations.load(Ordering::Relaxed),
            safety_violations: self.safety_violations.load(Ordering::Relaxed),
            generation_errors: self.generation_errors.load(Ordering::Relaxed),
            cancelled_generations: self.cancelled_generations.load(Ordering::Relaxed),
            generated_tokens: self.generated_tokens.load(Ordering::Relaxed),
            total_processing_time_ms: self.total_processing_time_ms.load(Ordering::Relaxed),
            evicted_conversations: self.evicted_conversations.load(Ordering::Relaxed),
            trimmed_messages: self.trimmed_messages.load(Ordering::Relaxed),
        }
    }
}
