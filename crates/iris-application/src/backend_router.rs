//! Backend router.
//!
//! Picks the compute backend for a task from the device capability set, the
//! current thermal state, persisted preferences and cached benchmark results.

use iris_core::backend::{
    BackendPreferenceStore, BackendSelection, BackendType, BenchmarkResult, BenchmarkStore,
    ComputeTask, SelectionReason,
};
use iris_core::device::{DeviceProfile, DeviceProfileProvider, HardwareCapability};
use iris_core::thermal::{DeviceThermalState, RuntimeState};
use iris_core::{IrisError, Result};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::RwLock;

/// Router-local selection cache.
///
/// Entries are only valid for the restriction flag, device key and capability
/// set they were made under.
#[derive(Default)]
struct SelectionCache {
    selections: HashMap<ComputeTask, BackendSelection>,
    restricted: bool,
    device_key: Option<String>,
    capabilities: Option<BTreeSet<HardwareCapability>>,
}

impl SelectionCache {
    /// Drops every entry if the conditions they were made under have changed.
    fn revalidate(&mut self, profile: &DeviceProfile, restricted: bool) -> bool {
        let device_key = profile.device_key();
        let stale = self.restricted != restricted
            || self.device_key.as_deref() != Some(device_key.as_str())
            || self.capabilities.as_ref() != Some(&profile.capabilities);

        if stale {
            self.selections.clear();
            self.restricted = restricted;
            self.device_key = Some(device_key);
            self.capabilities = Some(profile.capabilities.clone());
        }
        stale
    }
}

pub struct BackendRouter {
    device: Arc<dyn DeviceProfileProvider>,
    state: Arc<RuntimeState>,
    benchmarks: Arc<dyn BenchmarkStore>,
    preferences: Arc<dyn BackendPreferenceStore>,
    cache: RwLock<SelectionCache>,
}

impl BackendRouter {
    pub fn new(
        device: Arc<dyn DeviceProfileProvider>,
        state: Arc<RuntimeState>,
        benchmarks: Arc<dyn BenchmarkStore>,
        preferences: Arc<dyn BackendPreferenceStore>,
    ) -> Self {
        Self {
            device,
            state,
            benchmarks,
            preferences,
            cache: RwLock::new(SelectionCache::default()),
        }
    }

    /// Supported backends in precedence order, CPU backends only when restricted.
    pub fn candidates(profile: &DeviceProfile, restricted: bool) -> Vec<BackendType> {
        BackendType::iter()
            .filter(|backend| backend.is_supported_by(profile))
            .filter(|backend| !restricted || backend.is_cpu())
            .collect()
    }

    /// Whether selection is currently limited to CPU backends.
    ///
    /// Always true while overheating. While hot it follows the user's
    /// `gpu_allowed_in_severe_thermal` preference.
    pub async fn is_restricted(&self) -> bool {
        match self.state.thermal_state().device_state() {
            DeviceThermalState::Normal => false,
            DeviceThermalState::Hot => !self.preferences.gpu_allowed_in_severe_thermal().await,
            DeviceThermalState::Overheating => true,
        }
    }

    /// Selects the backend for `task`.
    ///
    /// Order: router cache, stored preference, fastest benchmark, then the first
    /// candidate in precedence order. Every step only accepts a backend that is
    /// in the current candidate set.
    pub async fn select_backend(&self, task: ComputeTask) -> Result<BackendSelection> {
        let profile = self.device.device_profile().await;
        let restricted = self.is_restricted().await;
        let candidates = Self::candidates(&profile, restricted);
        if candidates.is_empty() {
            return Err(IrisError::NoViableBackend { task });
        }

        // Selection runs under the write lock so concurrent callers never
        // observe a half-updated cache.
        let mut cache = self.cache.write().await;
        if cache.revalidate(&profile, restricted) {
            tracing::debug!(target: "backend", restricted, "Backend selection cache invalidated");
        }

        if let Some(selection) = cache.selections.get(&task) {
            if candidates.contains(&selection.backend) {
                return Ok(BackendSelection {
                    reason: SelectionReason::Cached,
                    ..selection.clone()
                });
            }
        }

        let device_key = profile.device_key();
        let (backend, reason) = match self.preferences.cached_backend(&device_key, task).await {
            Some(preferred) if candidates.contains(&preferred) => {
                (preferred, SelectionReason::StoredPreference)
            }
            _ => match self.fastest_benchmarked(task, &candidates).await {
                Some(backend) => (backend, SelectionReason::Benchmark),
                None => (candidates[0], SelectionReason::Precedence),
            },
        };

        // Choices made under restriction stay in the router cache only, so the
        // stored preference does not pin the device to CPU after it cools down.
        if reason != SelectionReason::StoredPreference && !restricted {
            if let Err(e) = self.preferences.store_backend(&device_key, task, backend).await {
                tracing::warn!(target: "backend", "Failed to store backend preference: {}", e);
            }
        }

        let selection = BackendSelection {
            backend,
            task,
            reason,
            cached_at: Utc::now(),
        };
        cache.selections.insert(task, selection.clone());

        tracing::info!(
            target: "backend",
            task = %task,
            backend = %backend,
            reason = %reason,
            restricted,
            "Selected compute backend"
        );
        Ok(selection)
    }

    /// Whether `backend` is usable right now (supported and not thermally excluded).
    pub async fn validate_backend(&self, backend: BackendType) -> bool {
        let profile = self.device.device_profile().await;
        let restricted = self.is_restricted().await;
        backend.is_supported_by(&profile) && (!restricted || backend.is_cpu())
    }

    /// Re-probes the device. A changed capability set discards both the router
    /// cache and the stored preferences for the device.
    pub async fn refresh_device_profile(&self) -> Result<DeviceProfile> {
        let previous = self.device.device_profile().await;
        let profile = self.device.refresh().await?;

        if previous.capabilities != profile.capabilities
            || previous.device_key() != profile.device_key()
        {
            tracing::info!(
                target: "backend",
                device = %profile.device_key(),
                "Device capabilities changed, discarding backend preferences"
            );
            self.invalidate().await;
            self.preferences.clear_device(&previous.device_key()).await?;
            if previous.device_key() != profile.device_key() {
                self.preferences.clear_device(&profile.device_key()).await?;
            }
        }
        Ok(profile)
    }

    /// Clears the router cache.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = SelectionCache::default();
    }

    /// Highest throughput among candidates; ties go to the earlier precedence.
    async fn fastest_benchmarked(
        &self,
        task: ComputeTask,
        candidates: &[BackendType],
    ) -> Option<BackendType> {
        let results = self.benchmarks.cached_results().await?;
        pick_fastest(&results, task, candidates)
    }
}

fn pick_fastest(
    results: &[BenchmarkResult],
    task: ComputeTask,
    candidates: &[BackendType],
) -> Option<BackendType> {
    let mut best: Option<(BackendType, f64)> = None;
    for result in results {
        if result.task != task
            || !candidates.contains(&result.backend)
            || !result.tokens_per_second.is_finite()
        {
            continue;
        }
        let better = match best {
            None => true,
            Some((backend, tps)) => {
                result.tokens_per_second > tps
                    || (result.tokens_per_second == tps
                        && result.backend.precedence() < backend.precedence())
            }
        };
        if better {
            best = Some((result.backend, result.tokens_per_second));
        }
    }
    best.map(|(backend, _)| backend)
}
