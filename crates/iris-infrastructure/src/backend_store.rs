//! Backend benchmark and preference stores.

use async_trait::async_trait;
use iris_core::Result;
use iris_core::backend::{
    BackendPreferenceStore, BackendType, BenchmarkResult, BenchmarkStore, ComputeTask,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Benchmark results held in memory for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryBenchmarkStore {
    results: RwLock<Option<Vec<BenchmarkResult>>>,
}

impl InMemoryBenchmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result, replacing an older one for the same backend and task.
    pub async fn record(&self, result: BenchmarkResult) {
        let mut results = self.results.write().await;
        let results = results.get_or_insert_with(Vec::new);
        results.retain(|r| !(r.backend == result.backend && r.task == result.task));
        results.push(result);
    }
}

#[async_trait]
impl BenchmarkStore for InMemoryBenchmarkStore {
    async fn cached_results(&self) -> Option<Vec<BenchmarkResult>> {
        self.results.read().await.clone()
    }
}

/// On-disk shape of the preference file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default)]
    gpu_allowed_in_severe_thermal: bool,
    /// device key -> task -> backend
    #[serde(default)]
    devices: BTreeMap<String, BTreeMap<String, BackendType>>,
}

/// Backend preferences persisted as JSON, write-through.
///
/// Without a path the store keeps everything in memory.
pub struct FileBackendPreferenceStore {
    path: Option<PathBuf>,
    data: RwLock<PreferenceFile>,
    gpu_allowed_override: AtomicBool,
}

impl FileBackendPreferenceStore {
    pub fn in_memory(gpu_allowed_in_severe_thermal: bool) -> Self {
        Self {
            path: None,
            data: RwLock::new(PreferenceFile {
                gpu_allowed_in_severe_thermal,
                ..Default::default()
            }),
            gpu_allowed_override: AtomicBool::new(false),
        }
    }

    /// Opens the store at `path`; a missing file starts empty.
    ///
    /// `gpu_allowed_in_severe_thermal` from configuration wins when set.
    pub async fn open(path: PathBuf, gpu_allowed_in_severe_thermal: bool) -> Result<Self> {
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            Ok(_) => PreferenceFile::default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PreferenceFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
            gpu_allowed_override: AtomicBool::new(gpu_allowed_in_severe_thermal),
        })
    }

    pub async fn set_gpu_allowed_in_severe_thermal(&self, allowed: bool) -> Result<()> {
        self.gpu_allowed_override.store(false, Ordering::Relaxed);
        let mut data = self.data.write().await;
        data.gpu_allowed_in_severe_thermal = allowed;
        self.persist(&data).await
    }

    async fn persist(&self, data: &PreferenceFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(data)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendPreferenceStore for FileBackendPreferenceStore {
    async fn cached_backend(&self, device_key: &str, task: ComputeTask) -> Option<BackendType> {
        self.data
            .read()
            .await
            .devices
            .get(device_key)?
            .get(&task.to_string())
            .copied()
    }

    async fn store_backend(
        &self,
        device_key: &str,
        task: ComputeTask,
        backend: BackendType,
    ) -> Result<()> {
        let mut data = self.data.write().await;
        data.devices
            .entry(device_key.to_string())
            .or_default()
            .insert(task.to_string(), backend);
        self.persist(&data).await
    }

    async fn clear_device(&self, device_key: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if data.devices.remove(device_key).is_some() {
            self.persist(&data).await?;
        }
        Ok(())
    }

    async fn gpu_allowed_in_severe_thermal(&self) -> bool {
        self.gpu_allowed_override.load(Ordering::Relaxed)
            || self.data.read().await.gpu_allowed_in_severe_thermal
    }
}
