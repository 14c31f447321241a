//! Thermal monitor service.
//!
//! Converts raw sensor samples into the hysteretic control signal held by
//! [`RuntimeState`]. Samples are serialized: a sample is read and applied under
//! one lock, so two samples are never processed concurrently.

use iris_core::config::ThermalConfig;
use iris_core::thermal::{
    DeviceThermalState, MemoryState, RuntimeState, ThermalReading, ThermalSensor, ThermalState,
    ThermalTransition,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct ThermalMonitor {
    state: Arc<RuntimeState>,
    sensor: Arc<dyn ThermalSensor>,
    config: ThermalConfig,
    sample_lock: Mutex<()>,
}

impl ThermalMonitor {
    pub fn new(state: Arc<RuntimeState>, sensor: Arc<dyn ThermalSensor>, config: ThermalConfig) -> Self {
        Self {
            state,
            sensor,
            config,
            sample_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    /// Classifies a temperature and applies the profile side effect.
    pub async fn update_thermal_state(&self, celsius: f32) -> ThermalTransition {
        let _guard = self.sample_lock.lock().await;
        self.apply_temperature(Some(celsius))
    }

    /// Classifies available/total memory into the shared status.
    pub async fn update_memory_state(&self, available_bytes: u64, total_bytes: u64) -> MemoryState {
        let _guard = self.sample_lock.lock().await;
        self.apply_memory(available_bytes, total_bytes)
    }

    /// Reads both sensors and applies the results as one sample.
    pub async fn sample(&self) -> ThermalTransition {
        let _guard = self.sample_lock.lock().await;

        let transition = match self.sensor.read_temperature().await {
            Ok(celsius) => self.apply_temperature(Some(celsius)),
            Err(e) => {
                tracing::warn!(target: "thermal", "Temperature sensor unavailable: {}", e);
                self.apply_temperature(None)
            }
        };

        match self.sensor.read_memory().await {
            Ok(reading) => {
                self.apply_memory(reading.available_bytes, reading.total_bytes);
            }
            Err(e) => {
                tracing::warn!(target: "thermal", "Memory sensor unavailable, keeping previous state: {}", e);
            }
        }

        transition
    }

    /// Polling interval for the next sample; shorter while the device is hot.
    pub fn poll_interval(&self) -> Duration {
        let millis = match self.state.thermal_state().device_state() {
            DeviceThermalState::Normal => self.config.poll_interval_ms,
            DeviceThermalState::Hot | DeviceThermalState::Overheating => {
                self.config.hot_poll_interval_ms
            }
        };
        Duration::from_millis(millis.max(1))
    }

    /// Background sampling loop. Returns when `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            target: "thermal",
            "Thermal monitor started ({}ms / {}ms hot)",
            self.config.poll_interval_ms,
            self.config.hot_poll_interval_ms
        );
        loop {
            self.sample().await;
            let interval = self.poll_interval();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!(target: "thermal", "Thermal monitor stopped");
    }

    /// `None` means the sensor could not be read. The monitor then assumes at
    /// least `Hot` and never lowers an already hotter state.
    fn apply_temperature(&self, celsius: Option<f32>) -> ThermalTransition {
        let (state, reading) = match celsius {
            Some(c) if c.is_finite() => (ThermalState::from_celsius(c), Some(ThermalReading::now(c))),
            _ => (
                self.state.thermal_state().max(ThermalState::UNKNOWN_READING),
                None,
            ),
        };

        let transition = self.state.apply_thermal(state, reading);
        if transition.state_changed() {
            tracing::info!(
                target: "thermal",
                from = %transition.previous_state,
                to = %transition.state,
                device_state = %transition.device_state(),
                "Thermal state changed"
            );
        }
        if transition.profile_changed() {
            tracing::info!(
                target: "thermal",
                from = %transition.previous_profile,
                to = %transition.profile,
                "Performance profile changed"
            );
        }
        transition
    }

    fn apply_memory(&self, available_bytes: u64, total_bytes: u64) -> MemoryState {
        let memory_state = MemoryState::classify(available_bytes, total_bytes);
        let previous = self.state.apply_memory(memory_state);
        if previous != memory_state {
            tracing::info!(
                target: "thermal",
                from = %previous,
                to = %memory_state,
                available_bytes,
                total_bytes,
                "Memory state changed"
            );
        }
        memory_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iris_core::thermal::{MemoryReading, PerformanceProfile};
    use iris_core::{IrisError, Result};
    use std::sync::Mutex as StdMutex;

    struct MockSensor {
        temperature: StdMutex<Option<f32>>,
        memory: MemoryReading,
    }

    impl MockSensor {
        fn new(temperature: Option<f32>) -> Self {
            Self {
                temperature: StdMutex::new(temperature),
                memory: MemoryReading {
                    available_bytes: 20,
                    total_bytes: 100,
                },
            }
        }
    }

    #[async_trait]
    impl ThermalSensor for MockSensor {
        async fn read_temperature(&self) -> Result<f32> {
            self.temperature
                .lock()
                .unwrap()
                .ok_or_else(|| IrisError::sensor("no thermal zone"))
        }

        async fn read_memory(&self) -> Result<MemoryReading> {
            Ok(self.memory)
        }
    }

    fn monitor(profile: PerformanceProfile, sensor: MockSensor) -> ThermalMonitor {
        ThermalMonitor::new(
            Arc::new(RuntimeState::new(profile)),
            Arc::new(sensor),
            ThermalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_classification_and_profile_side_effects() {
        let monitor = monitor(PerformanceProfile::Balanced, MockSensor::new(None));

        for t in [20.0, 39.9, 40.0] {
            let transition = monitor.update_thermal_state(t).await;
            assert_eq!(transition.device_state(), DeviceThermalState::Normal, "t = {t}");
        }

        for t in [40.1, 43.0, 45.0] {
            let transition = monitor.update_thermal_state(t).await;
            assert_eq!(transition.device_state(), DeviceThermalState::Hot, "t = {t}");
            assert_eq!(transition.profile, PerformanceProfile::BatterySaver);
        }

        for t in [45.1, 60.0] {
            let transition = monitor.update_thermal_state(t).await;
            assert_eq!(transition.device_state(), DeviceThermalState::Overheating, "t = {t}");
            assert_eq!(transition.profile, PerformanceProfile::Emergency);
        }
    }

    #[tokio::test]
    async fn test_hysteresis_restores_balanced_from_emergency() {
        let monitor = monitor(PerformanceProfile::Emergency, MockSensor::new(None));
        let transition = monitor.update_thermal_state(30.0).await;
        assert_eq!(transition.profile, PerformanceProfile::Balanced);
    }

    #[tokio::test]
    async fn test_hysteresis_keeps_user_performance() {
        let monitor = monitor(PerformanceProfile::Performance, MockSensor::new(None));
        let transition = monitor.update_thermal_state(30.0).await;
        assert_eq!(transition.profile, PerformanceProfile::Performance);
        assert!(!transition.profile_changed());
    }

    #[tokio::test]
    async fn test_unavailable_sensor_fails_safe_to_hot() {
        let monitor = monitor(PerformanceProfile::Balanced, MockSensor::new(None));
        let transition = monitor.sample().await;
        assert_eq!(transition.device_state(), DeviceThermalState::Hot);
        assert_eq!(monitor.state().profile(), PerformanceProfile::BatterySaver);
        assert!(monitor.state().snapshot().last_reading.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_sensor_keeps_hotter_state() {
        let monitor = monitor(PerformanceProfile::Balanced, MockSensor::new(None));
        monitor.update_thermal_state(55.0).await;
        let transition = monitor.sample().await;
        assert_eq!(transition.state, ThermalState::Critical);
    }

    #[tokio::test]
    async fn test_sample_updates_memory_state() {
        let monitor = monitor(PerformanceProfile::Balanced, MockSensor::new(Some(30.0)));
        monitor.sample().await;
        assert_eq!(monitor.state().snapshot().memory_state, MemoryState::Low);
        assert_eq!(monitor.update_memory_state(5, 100).await, MemoryState::Critical);
    }

    #[tokio::test]
    async fn test_poll_interval_is_adaptive() {
        let monitor = monitor(PerformanceProfile::Balanced, MockSensor::new(Some(30.0)));
        assert_eq!(monitor.poll_interval(), Duration::from_millis(5_000));
        monitor.update_thermal_state(44.0).await;
        assert_eq!(monitor.poll_interval(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let monitor = Arc::new(monitor(PerformanceProfile::Balanced, MockSensor::new(Some(42.0))));
        let cancel = CancellationToken::new();
        let handle = {
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { monitor.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(monitor.state().thermal_state(), ThermalState::Moderate);
    }
}
