//! Process-wide thermal state cell.

use super::model::{
    DeviceThermalState, MemoryState, PerformanceProfile, ThermalReading, ThermalState, ThermalStatus,
    ThermalTransition,
};
use chrono::Utc;
use tokio::sync::watch;

/// Lock-guarded owner of the current [`ThermalStatus`].
///
/// Read/write contract:
/// - The thermal monitor is the only writer of `thermal_state` and `memory_state`.
/// - `profile` is written by the monitor's hysteresis rule and by explicit user
///   selection through [`RuntimeState::select_profile`].
/// - Every write is a single read-modify-write inside the channel lock, so a reader
///   never observes a state/profile pair that the rule could not produce.
/// - Readers either take a snapshot or subscribe for change notifications.
#[derive(Debug)]
pub struct RuntimeState {
    tx: watch::Sender<ThermalStatus>,
}

impl RuntimeState {
    pub fn new(profile: PerformanceProfile) -> Self {
        let (tx, _rx) = watch::channel(ThermalStatus::new(profile));
        Self { tx }
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> ThermalStatus {
        self.tx.borrow().clone()
    }

    pub fn thermal_state(&self) -> ThermalState {
        self.tx.borrow().thermal_state
    }

    pub fn profile(&self) -> PerformanceProfile {
        self.tx.borrow().profile
    }

    /// Subscribes to status changes. Receivers are only woken on real changes.
    pub fn subscribe(&self) -> watch::Receiver<ThermalStatus> {
        self.tx.subscribe()
    }

    /// Applies a classified sample and the profile hysteresis rule atomically.
    pub fn apply_thermal(
        &self,
        state: ThermalState,
        reading: Option<ThermalReading>,
    ) -> ThermalTransition {
        let mut transition = None;
        self.tx.send_if_modified(|status| {
            let previous_state = status.thermal_state;
            let previous_profile = status.profile;
            let profile = previous_profile.after_thermal(state.device_state());

            status.last_reading = reading;
            status.updated_at = Utc::now();
            status.thermal_state = state;
            status.profile = profile;

            transition = Some(ThermalTransition {
                previous_state,
                state,
                previous_profile,
                profile,
            });
            previous_state != state || previous_profile != profile
        });
        transition.unwrap_or_else(|| {
            let profile = self.profile();
            ThermalTransition {
                previous_state: state,
                state,
                previous_profile: profile,
                profile,
            }
        })
    }

    /// Stores a new memory classification. Returns the previous one.
    pub fn apply_memory(&self, memory_state: MemoryState) -> MemoryState {
        let mut previous = memory_state;
        self.tx.send_if_modified(|status| {
            previous = status.memory_state;
            status.memory_state = memory_state;
            previous != memory_state
        });
        previous
    }

    /// Explicit profile selection (user preference or device-class default).
    ///
    /// Ignored while the device is not thermally `Normal`: a thermally imposed
    /// profile can only be lifted by the hysteresis rule.
    pub fn select_profile(&self, profile: PerformanceProfile) -> bool {
        self.tx.send_if_modified(|status| {
            if status.device_state() != DeviceThermalState::Normal
                || status.profile == profile
            {
                return false;
            }
            status.profile = profile;
            status.updated_at = Utc::now();
            true
        })
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new(PerformanceProfile::Balanced)
    }
}
