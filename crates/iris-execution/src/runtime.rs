//! Runtime assembly and background supervision.

use iris_application::{BackendRouter, ConversationManager, InferenceSessionManager, ThermalMonitor};
use iris_core::Result;
use iris_core::backend::{BackendPreferenceStore, BenchmarkStore};
use iris_core::config::RuntimeConfig;
use iris_core::conversation::ConversationSink;
use iris_core::device::DeviceProfileProvider;
use iris_core::inference::{ModelStorage, SafetyFilter, TokenGenerator};
use iris_core::thermal::{RuntimeState, ThermalSensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// How often RAM figures and capabilities are re-probed.
const DEVICE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// External collaborators the runtime is assembled from.
pub struct RuntimeComponents {
    pub sensor: Arc<dyn ThermalSensor>,
    pub device: Arc<dyn DeviceProfileProvider>,
    pub generator: Arc<dyn TokenGenerator>,
    pub storage: Arc<dyn ModelStorage>,
    pub safety: Arc<dyn SafetyFilter>,
    pub benchmarks: Arc<dyn BenchmarkStore>,
    pub preferences: Arc<dyn BackendPreferenceStore>,
    pub sink: Arc<dyn ConversationSink>,
}

/// The assembled runtime: shared state, the four services and their
/// background loops.
pub struct IrisRuntime {
    state: Arc<RuntimeState>,
    monitor: Arc<ThermalMonitor>,
    router: Arc<BackendRouter>,
    inference: Arc<InferenceSessionManager>,
    conversations: Arc<ConversationManager>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    started: AtomicBool,
    device_refresh_interval: Duration,
}

impl IrisRuntime {
    pub fn new(config: &RuntimeConfig, components: RuntimeComponents) -> Self {
        let state = Arc::new(RuntimeState::new(config.thermal.initial_profile));
        let monitor = Arc::new(ThermalMonitor::new(
            state.clone(),
            components.sensor,
            config.thermal.clone(),
        ));
        let router = Arc::new(BackendRouter::new(
            components.device,
            state.clone(),
            components.benchmarks,
            components.preferences,
        ));
        let inference = Arc::new(InferenceSessionManager::new(
            router.clone(),
            state.clone(),
            components.generator,
            components.storage,
            components.safety,
        ));
        let conversations = Arc::new(ConversationManager::new(
            inference.clone(),
            components.sink,
            config.conversation.clone(),
            config.inference.generation,
        ));

        Self {
            state,
            monitor,
            router,
            inference,
            conversations,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
            device_refresh_interval: DEVICE_REFRESH_INTERVAL,
        }
    }

    pub fn with_device_refresh_interval(mut self, interval: Duration) -> Self {
        self.device_refresh_interval = interval;
        self
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    pub fn monitor(&self) -> &Arc<ThermalMonitor> {
        &self.monitor
    }

    pub fn router(&self) -> &Arc<BackendRouter> {
        &self.router
    }

    pub fn inference(&self) -> &Arc<InferenceSessionManager> {
        &self.inference
    }

    pub fn conversations(&self) -> &Arc<ConversationManager> {
        &self.conversations
    }

    /// Spawns the thermal sampling and device refresh loops. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let monitor = self.monitor.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move { monitor.run(cancel).await });

        let router = self.router.clone();
        let cancel = self.cancel.clone();
        let interval = self.device_refresh_interval;
        self.tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if let Err(e) = router.refresh_device_profile().await {
                    tracing::warn!(target: "backend", "Device refresh failed: {}", e);
                }
            }
        });

        tracing::info!(target: "runtime", "Iris runtime started");
    }

    /// Stops the background loops and unloads the model.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.inference.shutdown().await?;
        tracing::info!(target: "runtime", "Iris runtime stopped");
        Ok(())
    }
}
