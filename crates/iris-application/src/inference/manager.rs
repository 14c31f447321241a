//! Inference session manager.
//!
//! Owns the loaded model and the inference sessions, applies the thermal clamp
//! and the safety filter around the native generator, and exposes each
//! generation as an [`InferenceStream`].

use super::session::{BusyGuard, InferenceSession, SessionInfo};
use super::throttle::{DeviceDefaults, clamp_parameters, requires_pause};
use crate::backend_router::BackendRouter;
use chrono::Utc;
use futures::StreamExt;
use iris_core::backend::ComputeTask;
use iris_core::inference::{
    GenerationParameters, InferenceEvent, InferenceStream, LoadedModel, ModelDescriptor,
    ModelHandle, ModelParameterOverrides, ModelParameters, ModelStorage, SafetyFilter,
    SafetyStage, TokenGenerator,
};
use iris_core::thermal::{PerformanceProfile, RuntimeState, ThermalState};
use iris_core::{IrisError, Result};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;

/// Events buffered between the producer task and a slow consumer.
const EVENT_BUFFER: usize = 32;

struct ActiveModel {
    info: LoadedModel,
    handle: ModelHandle,
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Arc<InferenceSession>>,
    by_conversation: HashMap<String, String>,
}

struct Inner {
    router: Arc<BackendRouter>,
    state: Arc<RuntimeState>,
    generator: Arc<dyn TokenGenerator>,
    storage: Arc<dyn ModelStorage>,
    safety: Arc<dyn SafetyFilter>,
    model: RwLock<Option<ActiveModel>>,
    sessions: RwLock<SessionTable>,
    /// Serializes use of the native model handle across sessions.
    generation_lock: Mutex<()>,
    load_lock: Mutex<()>,
}

pub struct InferenceSessionManager {
    inner: Arc<Inner>,
}

impl InferenceSessionManager {
    pub fn new(
        router: Arc<BackendRouter>,
        state: Arc<RuntimeState>,
        generator: Arc<dyn TokenGenerator>,
        storage: Arc<dyn ModelStorage>,
        safety: Arc<dyn SafetyFilter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                router,
                state,
                generator,
                storage,
                safety,
                model: RwLock::new(None),
                sessions: RwLock::new(SessionTable::default()),
                generation_lock: Mutex::new(()),
                load_lock: Mutex::new(()),
            }),
        }
    }

    /// Loads a model, replacing the current one only once the new load succeeded.
    ///
    /// Fails with `InsufficientMemory`, `ModelIntegrity` or `NoViableBackend`
    /// before anything is handed to the native engine.
    pub async fn load_model(
        &self,
        descriptor: ModelDescriptor,
        overrides: ModelParameterOverrides,
    ) -> Result<LoadedModel> {
        let _loading = self.inner.load_lock.lock().await;

        let profile = self.inner.router.refresh_device_profile().await?;
        if profile.available_ram_bytes < descriptor.memory_requirement_bytes {
            return Err(IrisError::InsufficientMemory {
                required_bytes: descriptor.memory_requirement_bytes,
                available_bytes: profile.available_ram_bytes,
            });
        }

        let path = self.inner.storage.verify(&descriptor).await?;

        let defaults = DeviceDefaults::for_class(profile.device_class, descriptor.native_context_size);
        let selection = self.inner.router.select_backend(ComputeTask::LlmInference).await?;
        let parameters = ModelParameters {
            context_size: overrides.context_size.unwrap_or(defaults.context_size),
            batch_size: overrides.batch_size.unwrap_or(defaults.batch_size),
            threads: overrides.threads.unwrap_or(0),
            seed: overrides.seed.unwrap_or(-1),
            backend: selection.backend,
        };

        tracing::info!(
            target: "inference",
            "Initializing {} backend (code {})",
            parameters.backend,
            parameters.backend.native_code()
        );
        self.inner.generator.initialize_backend(&parameters).await?;
        let handle = self.inner.generator.load_model(&path, &parameters).await?;

        let info = LoadedModel {
            model_id: generate_model_id(),
            descriptor,
            parameters,
            loaded_at: Utc::now(),
        };

        let previous = {
            let _permit = self.inner.generation_lock.lock().await;
            self.inner.model.write().await.replace(ActiveModel {
                info: info.clone(),
                handle,
            })
        };
        if let Some(previous) = previous {
            self.close_all_sessions().await;
            self.release(previous).await;
        }

        self.apply_default_profile(defaults.profile);

        tracing::info!(
            target: "inference",
            model_id = %info.model_id,
            name = %info.descriptor.name,
            context_size = info.parameters.context_size,
            batch_size = info.parameters.batch_size,
            threads = info.parameters.effective_threads(),
            device_class = %profile.device_class,
            "Model loaded"
        );
        Ok(info)
    }

    /// Unloads the current model and closes every session.
    ///
    /// Returns `false` when no model was loaded.
    pub async fn unload_model(&self) -> Result<bool> {
        let previous = {
            let _permit = self.inner.generation_lock.lock().await;
            self.inner.model.write().await.take()
        };
        let Some(previous) = previous else {
            return Ok(false);
        };
        self.close_all_sessions().await;
        let model_id = previous.info.model_id.clone();
        self.inner.generator.unload(&previous.handle).await?;
        tracing::info!(target: "inference", model_id = %model_id, "Model unloaded");
        Ok(true)
    }

    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(target: "inference", "Shutting down inference session manager");
        self.unload_model().await.map(|_| ())
    }

    pub async fn loaded_model(&self) -> Option<LoadedModel> {
        self.inner
            .model
            .read()
            .await
            .as_ref()
            .map(|model| model.info.clone())
    }

    /// Creates a session for a conversation, closing any previous one.
    pub async fn create_session(&self, conversation_id: &str) -> Result<String> {
        self.require_model().await?;

        let session = Arc::new(InferenceSession::new(conversation_id));
        let session_id = session.id().to_string();

        let mut table = self.inner.sessions.write().await;
        if let Some(old_id) = table
            .by_conversation
            .insert(conversation_id.to_string(), session_id.clone())
        {
            if let Some(old) = table.sessions.remove(&old_id) {
                old.close();
                tracing::debug!(target: "inference", session_id = %old_id, "Replaced inference session");
            }
        }
        table.sessions.insert(session_id.clone(), session);

        tracing::debug!(
            target: "inference",
            session_id = %session_id,
            conversation_id,
            "Created inference session"
        );
        Ok(session_id)
    }

    /// Returns the open session of a conversation, creating one if needed.
    pub async fn ensure_session(&self, conversation_id: &str) -> Result<String> {
        if let Some(session_id) = self.session_for_conversation(conversation_id).await {
            return Ok(session_id);
        }
        self.create_session(conversation_id).await
    }

    pub async fn session_for_conversation(&self, conversation_id: &str) -> Option<String> {
        let table = self.inner.sessions.read().await;
        table
            .by_conversation
            .get(conversation_id)
            .filter(|id| table.sessions.get(*id).is_some_and(|s| !s.is_closed()))
            .cloned()
    }

    pub async fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let session = self.inner.sessions.read().await.sessions.get(session_id).cloned()?;
        Some(session.info().await)
    }

    pub async fn active_session_count(&self) -> usize {
        self.inner.sessions.read().await.sessions.len()
    }

    /// Closes a session. Idempotent; returns whether a session was closed.
    ///
    /// An in-flight generation on the session ends with an `Error` event.
    pub async fn close_session(&self, session_id: &str) -> bool {
        let mut table = self.inner.sessions.write().await;
        let Some(session) = table.sessions.remove(session_id) else {
            return false;
        };
        if table.by_conversation.get(session.conversation_id()).map(String::as_str) == Some(session_id) {
            table.by_conversation.remove(session.conversation_id());
        }
        session.close();
        tracing::debug!(target: "inference", session_id, "Closed inference session");
        true
    }

    /// Starts a generation on `session_id`.
    ///
    /// Parameters are clamped against the thermal state at call time. The
    /// returned stream yields `GenerationStarted`, zero or more `TokenGenerated`
    /// and exactly one terminal event. Dropping it cancels the generation.
    pub async fn generate_response(
        &self,
        session_id: &str,
        prompt: impl Into<String>,
        params: GenerationParameters,
    ) -> Result<InferenceStream> {
        let session = self
            .inner
            .sessions
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| IrisError::not_found("session", session_id))?;
        self.require_model().await?;
        let guard = session.try_begin()?;

        let status = self.inner.state.snapshot();
        let clamped = clamp_parameters(params, status.thermal_state);
        if clamped != params {
            tracing::debug!(
                target: "inference",
                session_id,
                thermal_state = %status.thermal_state,
                max_tokens = clamped.max_tokens,
                temperature = clamped.temperature,
                "Generation parameters clamped"
            );
        }

        let generation = Generation {
            inner: self.inner.clone(),
            guard,
            prompt: prompt.into(),
            params: clamped,
            thermal_state: status.thermal_state,
            profile: status.profile,
        };
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(generation.run(tx));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Computes an embedding with the loaded model.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let selection = self.inner.router.select_backend(ComputeTask::Embedding).await?;
        tracing::debug!(target: "inference", backend = %selection.backend, "Embedding request");

        let _permit = self.inner.generation_lock.lock().await;
        let handle = self
            .inner
            .model
            .read()
            .await
            .as_ref()
            .map(|model| model.handle.clone())
            .ok_or(IrisError::ModelNotLoaded)?;
        self.inner.generator.embed(&handle, text).await
    }

    async fn require_model(&self) -> Result<()> {
        if self.inner.model.read().await.is_none() {
            return Err(IrisError::ModelNotLoaded);
        }
        Ok(())
    }

    async fn close_all_sessions(&self) {
        let mut table = self.inner.sessions.write().await;
        for session in table.sessions.values() {
            session.close();
        }
        let closed = table.sessions.len();
        *table = SessionTable::default();
        if closed > 0 {
            tracing::debug!(target: "inference", closed, "Closed all inference sessions");
        }
    }

    async fn release(&self, previous: ActiveModel) {
        if let Err(e) = self.inner.generator.unload(&previous.handle).await {
            tracing::warn!(
                target: "inference",
                model_id = %previous.info.model_id,
                "Failed to unload replaced model: {}",
                e
            );
        }
    }

    fn apply_default_profile(&self, profile: PerformanceProfile) {
        if self.inner.state.select_profile(profile) {
            tracing::info!(target: "inference", profile = %profile, "Applied device-class profile");
        }
    }
}

/// `model_<epoch millis>_<4 random digits>`
fn generate_model_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("model_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// One in-flight generation, driven on its own task.
struct Generation {
    inner: Arc<Inner>,
    guard: BusyGuard,
    prompt: String,
    params: GenerationParameters,
    thermal_state: ThermalState,
    profile: PerformanceProfile,
}

impl Generation {
    async fn run(self, tx: mpsc::Sender<InferenceEvent>) {
        let session = self.guard.session().clone();
        let started = InferenceEvent::GenerationStarted {
            session_id: session.id().to_string(),
            parameters: self.params,
            thermal_state: self.thermal_state,
            profile: self.profile,
        };
        if tx.send(started).await.is_err() {
            return;
        }
        session.record_parameters(self.params).await;

        tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(target: "inference", session_id = %session.id(), "Generation cancelled by consumer");
            }
            _ = session.cancelled() => {
                let _ = tx
                    .send(InferenceEvent::Error {
                        message: format!("session '{}' was closed", session.id()),
                    })
                    .await;
            }
            _ = self.drive(&tx) => {}
        }
        // The busy flag is released when `self.guard` drops here.
    }

    async fn drive(&self, tx: &mpsc::Sender<InferenceEvent>) {
        let session = self.guard.session();
        let verdict = self.inner.safety.check_input(&self.prompt).await;
        if !verdict.allowed {
            tracing::info!(target: "inference", session_id = %session.id(), "Input rejected by safety filter");
            let _ = tx
                .send(InferenceEvent::SafetyViolation {
                    stage: SafetyStage::Input,
                    reason: verdict.reason.unwrap_or_else(|| "input rejected".to_string()),
                })
                .await;
            return;
        }

        if requires_pause(self.thermal_state) {
            self.wait_for_cooldown().await;
        }

        match self.generate(tx).await {
            Ok(Some(done)) => {
                let verdict = self.inner.safety.check_output(&done.text).await;
                let event = if verdict.allowed {
                    InferenceEvent::GenerationCompleted {
                        text: done.text,
                        token_count: done.token_count,
                        processing_time_ms: done.processing_time_ms,
                    }
                } else {
                    tracing::info!(target: "inference", session_id = %session.id(), "Output rejected by safety filter");
                    InferenceEvent::SafetyViolation {
                        stage: SafetyStage::Output,
                        reason: verdict.reason.unwrap_or_else(|| "output rejected".to_string()),
                    }
                };
                let _ = tx.send(event).await;
            }
            // Consumer went away mid-stream.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "inference", session_id = %session.id(), "Generation failed: {}", e);
                let _ = tx
                    .send(InferenceEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Streams tokens to `tx`. Returns `Ok(None)` if the consumer disconnected.
    async fn generate(&self, tx: &mpsc::Sender<InferenceEvent>) -> Result<Option<FinishedText>> {
        let _permit = self.inner.generation_lock.lock().await;
        let handle = self
            .inner
            .model
            .read()
            .await
            .as_ref()
            .map(|model| model.handle.clone())
            .ok_or(IrisError::ModelNotLoaded)?;

        let clock = Instant::now();
        let mut tokens = self
            .inner
            .generator
            .generate(&handle, &self.prompt, &self.params)
            .await?;

        let mut text = String::new();
        let mut token_count = 0u32;
        while token_count < self.params.max_tokens {
            let Some(token) = tokens.next().await else {
                break;
            };
            let token = token?;
            text.push_str(&token);
            let event = InferenceEvent::TokenGenerated {
                token,
                index: token_count,
            };
            if tx.send(event).await.is_err() {
                return Ok(None);
            }
            token_count += 1;
        }

        Ok(Some(FinishedText {
            text,
            token_count,
            processing_time_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }

    async fn wait_for_cooldown(&self) {
        tracing::info!(
            target: "inference",
            session_id = %self.guard.session().id(),
            "Generation paused until the device cools down"
        );
        let mut rx = self.inner.state.subscribe();
        let cooled = rx.wait_for(|status| !requires_pause(status.thermal_state)).await.is_ok();
        if cooled {
            tracing::info!(target: "inference", "Generation resumed");
        }
    }
}

struct FinishedText {
    text: String,
    token_count: u32,
    processing_time_ms: u64,
}
