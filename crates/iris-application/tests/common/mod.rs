//! Shared collaborators for the application integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{StreamExt, stream};
use iris_application::{BackendRouter, ConversationManager, InferenceSessionManager};
use iris_core::backend::{BackendPreferenceStore, BackendType, BenchmarkResult, BenchmarkStore, ComputeTask};
use iris_core::config::ConversationConfig;
use iris_core::conversation::{ConversationMetadata, ConversationSink, Message};
use iris_core::device::{DeviceClass, DeviceProfile, DeviceProfileProvider};
use iris_core::inference::{
    GenerationParameters, ModelDescriptor, ModelHandle, ModelParameterOverrides, ModelParameters,
    ModelStorage, PermissiveSafetyFilter, TokenGenerator, TokenStream,
};
use iris_core::thermal::{PerformanceProfile, RuntimeState};
use iris_core::{IrisError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FixedDevice;

#[async_trait]
impl DeviceProfileProvider for FixedDevice {
    async fn device_profile(&self) -> DeviceProfile {
        DeviceProfile {
            total_ram_bytes: 6 << 30,
            available_ram_bytes: 3 << 30,
            device_class: DeviceClass::MidRange,
            ..DeviceProfile::default()
        }
    }

    async fn refresh(&self) -> Result<DeviceProfile> {
        Ok(self.device_profile().await)
    }
}

pub struct NoBenchmarks;

#[async_trait]
impl BenchmarkStore for NoBenchmarks {
    async fn cached_results(&self) -> Option<Vec<BenchmarkResult>> {
        None
    }
}

pub struct NoPreferences;

#[async_trait]
impl BackendPreferenceStore for NoPreferences {
    async fn cached_backend(&self, _: &str, _: ComputeTask) -> Option<BackendType> {
        None
    }
    async fn store_backend(&self, _: &str, _: ComputeTask, _: BackendType) -> Result<()> {
        Ok(())
    }
    async fn clear_device(&self, _: &str) -> Result<()> {
        Ok(())
    }
    async fn gpu_allowed_in_severe_thermal(&self) -> bool {
        false
    }
}

/// Splits a fixed reply into word tokens, sleeping `delay` before each one.
pub struct WordGenerator {
    pub reply: String,
    pub delay: Duration,
}

#[async_trait]
impl TokenGenerator for WordGenerator {
    async fn initialize_backend(&self, _params: &ModelParameters) -> Result<()> {
        Ok(())
    }

    async fn load_model(&self, path: &Path, _params: &ModelParameters) -> Result<ModelHandle> {
        Ok(ModelHandle(path.display().to_string()))
    }

    async fn generate(
        &self,
        _handle: &ModelHandle,
        _prompt: &str,
        _params: &GenerationParameters,
    ) -> Result<TokenStream> {
        let delay = self.delay;
        let words: Vec<String> = self
            .reply
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        Ok(Box::pin(stream::iter(words).then(move |word| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, IrisError>(word)
        })))
    }

    async fn embed(&self, _handle: &ModelHandle, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }

    async fn unload(&self, _handle: &ModelHandle) -> Result<()> {
        Ok(())
    }
}

pub struct TrustedStorage;

#[async_trait]
impl ModelStorage for TrustedStorage {
    async fn verify(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        Ok(descriptor.path.clone())
    }
}

/// Records what the manager hands over for persistence.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<(String, Message)>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl ConversationSink for RecordingSink {
    async fn persist_message(&self, conversation_id: &str, message: &Message) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), message.clone()));
        Ok(())
    }

    async fn persist_metadata(&self, _metadata: &ConversationMetadata) -> Result<()> {
        Ok(())
    }

    async fn remove_conversation(&self, conversation_id: &str) -> Result<()> {
        self.removed.lock().unwrap().push(conversation_id.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub state: Arc<RuntimeState>,
    pub inference: Arc<InferenceSessionManager>,
    pub conversations: ConversationManager,
    pub sink: Arc<RecordingSink>,
}

pub async fn harness(config: ConversationConfig, delay: Duration) -> Harness {
    let state = Arc::new(RuntimeState::new(PerformanceProfile::Balanced));
    let router = Arc::new(BackendRouter::new(
        Arc::new(FixedDevice),
        state.clone(),
        Arc::new(NoBenchmarks),
        Arc::new(NoPreferences),
    ));
    let inference = Arc::new(InferenceSessionManager::new(
        router,
        state.clone(),
        Arc::new(WordGenerator {
            reply: "Hello there friend".to_string(),
            delay,
        }),
        Arc::new(TrustedStorage),
        Arc::new(PermissiveSafetyFilter),
    ));
    inference
        .load_model(
            ModelDescriptor {
                id: "test".to_string(),
                name: "Test".to_string(),
                path: PathBuf::from("/models/test.gguf"),
                memory_requirement_bytes: 1 << 30,
                native_context_size: 4096,
                file_size_bytes: None,
            },
            ModelParameterOverrides::default(),
        )
        .await
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    let conversations = ConversationManager::new(
        inference.clone(),
        sink.clone(),
        config,
        GenerationParameters::default(),
    );
    Harness {
        state,
        inference,
        conversations,
        sink,
    }
}
