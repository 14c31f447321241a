pub mod chat;
pub mod config;
pub mod route;
pub mod status;

use anyhow::{Context, Result};
use iris_core::config::RuntimeConfig;
use iris_core::conversation::NoOpConversationSink;
use iris_execution::{IrisRuntime, RuntimeComponents};
use iris_infrastructure::{
    ConfiguredDeviceProfileProvider, EchoTokenGenerator, FileBackendPreferenceStore, FsModelStorage,
    InMemoryBenchmarkStore, IrisPaths, PatternSafetyFilter, SysfsThermalSensor,
};
use std::sync::Arc;
use std::time::Duration;

/// Delay between tokens of the development generator.
const ECHO_TOKEN_DELAY: Duration = Duration::from_millis(25);

/// Assembles a runtime from the Linux adapters and the development generator.
pub async fn build_runtime(config: &RuntimeConfig) -> Result<IrisRuntime> {
    let preferences_path = IrisPaths::backend_preferences_file()?;
    let preferences = FileBackendPreferenceStore::open(
        preferences_path.clone(),
        config.inference.gpu_allowed_in_severe_thermal,
    )
    .await
    .with_context(|| format!("Failed to open {}", preferences_path.display()))?;
    let safety = PatternSafetyFilter::from_config(&config.safety).context("Invalid safety patterns")?;

    let components = RuntimeComponents {
        sensor: Arc::new(SysfsThermalSensor::new()),
        device: Arc::new(ConfiguredDeviceProfileProvider::new(config.device.clone())),
        generator: Arc::new(EchoTokenGenerator::new(ECHO_TOKEN_DELAY)),
        storage: Arc::new(FsModelStorage::new(IrisPaths::models_dir().ok())),
        safety: Arc::new(safety),
        benchmarks: Arc::new(InMemoryBenchmarkStore::new()),
        preferences: Arc::new(preferences),
        sink: Arc::new(NoOpConversationSink),
    };

    Ok(IrisRuntime::new(config, components))
}
