//! Inference session bookkeeping.

use chrono::{DateTime, Utc};
use iris_core::inference::GenerationParameters;
use iris_core::{IrisError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A generation context bound to one conversation.
///
/// At most one generation runs on a session at a time; the `busy` flag is
/// claimed with a compare-and-swap and released by [`BusyGuard`].
#[derive(Debug)]
pub struct InferenceSession {
    id: String,
    conversation_id: String,
    created_at: DateTime<Utc>,
    busy: AtomicBool,
    cancel: CancellationToken,
    last_parameters: RwLock<Option<GenerationParameters>>,
}

impl InferenceSession {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            id: format!("session_{}", Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            created_at: Utc::now(),
            busy: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            last_parameters: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fires when the session is closed; in-flight generations stop on it.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Closes the session. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Claims the session for one generation, failing fast if one is in flight.
    pub fn try_begin(self: &Arc<Self>) -> Result<BusyGuard> {
        if self.is_closed() {
            return Err(IrisError::not_found("session", self.id.clone()));
        }
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IrisError::SessionBusy(self.id.clone()))?;
        Ok(BusyGuard(self.clone()))
    }

    pub async fn record_parameters(&self, params: GenerationParameters) {
        *self.last_parameters.write().await = Some(params);
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            created_at: self.created_at,
            busy: self.is_busy(),
            last_parameters: *self.last_parameters.read().await,
        }
    }
}

/// Releases the session's busy flag when the generation ends or is dropped.
#[derive(Debug)]
pub struct BusyGuard(Arc<InferenceSession>);

impl BusyGuard {
    pub fn session(&self) -> &Arc<InferenceSession> {
        &self.0
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub busy: bool,
    /// Clamped parameters of the most recent generation.
    pub last_parameters: Option<GenerationParameters>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_guard_is_exclusive() {
        let session = Arc::new(InferenceSession::new("conv"));
        let guard = session.try_begin().unwrap();
        assert!(session.is_busy());
        assert!(session.try_begin().unwrap_err().is_session_busy());

        drop(guard);
        assert!(!session.is_busy());
        assert!(session.try_begin().is_ok());
    }

    #[test]
    fn test_closed_session_rejects_generation() {
        let session = Arc::new(InferenceSession::new("conv"));
        session.close();
        session.close();
        assert!(session.is_closed());
        assert!(session.try_begin().unwrap_err().is_not_found());
    }
}
