//! Benchmark and preference store traits.

use super::model::{BackendType, BenchmarkResult, ComputeTask};
use crate::error::Result;
use async_trait::async_trait;

/// Read access to previously measured backend throughput.
#[async_trait]
pub trait BenchmarkStore: Send + Sync {
    /// Returns cached results, or `None` if no profiling has ever run.
    async fn cached_results(&self) -> Option<Vec<BenchmarkResult>>;
}

/// Persisted per-(device, task) backend preferences and user policy.
#[async_trait]
pub trait BackendPreferenceStore: Send + Sync {
    async fn cached_backend(&self, device_key: &str, task: ComputeTask) -> Option<BackendType>;

    async fn store_backend(
        &self,
        device_key: &str,
        task: ComputeTask,
        backend: BackendType,
    ) -> Result<()>;

    /// Forgets every stored preference for the device.
    async fn clear_device(&self, device_key: &str) -> Result<()>;

    /// User preference: keep accelerator backends while the device is `Hot`.
    async fn gpu_allowed_in_severe_thermal(&self) -> bool;
}
