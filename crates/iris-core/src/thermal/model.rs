//! Thermal, memory and performance-profile value types.
//!
//! Temperature flows through a single five-state [`ThermalState`]. The coarse
//! three-state [`DeviceThermalState`] used for profile selection is derived from it,
//! so profile selection and generation clamping can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Upper bound (inclusive) of the device `Normal` bucket, in °C.
pub const NORMAL_MAX_CELSIUS: f32 = 40.0;
/// Upper bound (inclusive) of the device `Hot` bucket, in °C.
pub const HOT_MAX_CELSIUS: f32 = 45.0;
/// Upper bound (inclusive) of the fine-grained `Normal` state, in °C.
pub const COOL_MAX_CELSIUS: f32 = 37.0;
/// Upper bound (inclusive) of the fine-grained `Severe` state, in °C.
pub const SEVERE_MAX_CELSIUS: f32 = 50.0;

/// Fine-grained thermal state used for generation clamping.
///
/// Ordered from coolest to hottest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ThermalState {
    Normal,
    Light,
    Moderate,
    Severe,
    Critical,
}

impl ThermalState {
    /// Classifies a temperature sample.
    ///
    /// Non-finite readings are treated as `Moderate` (device `Hot`), the most
    /// conservative state that does not stop generation outright.
    pub fn from_celsius(celsius: f32) -> Self {
        if !celsius.is_finite() {
            return ThermalState::UNKNOWN_READING;
        }
        if celsius <= COOL_MAX_CELSIUS {
            ThermalState::Normal
        } else if celsius <= NORMAL_MAX_CELSIUS {
            ThermalState::Light
        } else if celsius <= HOT_MAX_CELSIUS {
            ThermalState::Moderate
        } else if celsius <= SEVERE_MAX_CELSIUS {
            ThermalState::Severe
        } else {
            ThermalState::Critical
        }
    }

    /// State assumed when the sensor is unavailable.
    pub const UNKNOWN_READING: ThermalState = ThermalState::Moderate;

    pub fn device_state(self) -> DeviceThermalState {
        match self {
            ThermalState::Normal | ThermalState::Light => DeviceThermalState::Normal,
            ThermalState::Moderate => DeviceThermalState::Hot,
            ThermalState::Severe | ThermalState::Critical => DeviceThermalState::Overheating,
        }
    }
}

/// Coarse thermal bucket that drives the performance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DeviceThermalState {
    Normal,
    Hot,
    Overheating,
}

impl DeviceThermalState {
    pub fn from_celsius(celsius: f32) -> Self {
        ThermalState::from_celsius(celsius).device_state()
    }
}

/// Global throttle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceProfile {
    Performance,
    Balanced,
    BatterySaver,
    Emergency,
}

impl PerformanceProfile {
    /// Profiles that were imposed by thermal pressure rather than chosen.
    pub fn is_thermally_limited(self) -> bool {
        matches!(self, PerformanceProfile::BatterySaver | PerformanceProfile::Emergency)
    }

    /// Hysteresis rule applied on every thermal sample.
    ///
    /// Returning to `Normal` only restores `Balanced` from a thermally limited
    /// profile; a user-selected `Performance` profile is left untouched.
    pub fn after_thermal(self, device_state: DeviceThermalState) -> Self {
        match device_state {
            DeviceThermalState::Overheating => PerformanceProfile::Emergency,
            DeviceThermalState::Hot => PerformanceProfile::BatterySaver,
            DeviceThermalState::Normal if self.is_thermally_limited() => PerformanceProfile::Balanced,
            DeviceThermalState::Normal => self,
        }
    }
}

/// Memory pressure derived from available/total RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum MemoryState {
    Normal,
    Low,
    Critical,
}

impl MemoryState {
    /// `<10%` is Critical, `<25%` is Low. Exactly 10% is Low and exactly 25% is Normal.
    pub fn classify(available_bytes: u64, total_bytes: u64) -> Self {
        if total_bytes == 0 {
            return MemoryState::Critical;
        }
        // Integer comparison keeps the boundaries exact.
        let available = available_bytes.min(total_bytes) as u128 * 100;
        let total = total_bytes as u128;
        if available < total * 10 {
            MemoryState::Critical
        } else if available < total * 25 {
            MemoryState::Low
        } else {
            MemoryState::Normal
        }
    }
}

/// Point-in-time temperature sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalReading {
    pub celsius: f32,
    pub taken_at: DateTime<Utc>,
}

impl ThermalReading {
    pub fn now(celsius: f32) -> Self {
        Self {
            celsius,
            taken_at: Utc::now(),
        }
    }
}

/// Snapshot of the process-wide thermal/memory/profile state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStatus {
    pub thermal_state: ThermalState,
    pub profile: PerformanceProfile,
    pub memory_state: MemoryState,
    /// Last accepted sample; `None` when the sensor was unavailable.
    pub last_reading: Option<ThermalReading>,
    pub updated_at: DateTime<Utc>,
}

impl ThermalStatus {
    pub fn new(profile: PerformanceProfile) -> Self {
        Self {
            thermal_state: ThermalState::Normal,
            profile,
            memory_state: MemoryState::Normal,
            last_reading: None,
            updated_at: Utc::now(),
        }
    }

    pub fn device_state(&self) -> DeviceThermalState {
        self.thermal_state.device_state()
    }
}

impl Default for ThermalStatus {
    fn default() -> Self {
        Self::new(PerformanceProfile::Balanced)
    }
}

/// Result of feeding one sample through the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalTransition {
    pub previous_state: ThermalState,
    pub state: ThermalState,
    pub previous_profile: PerformanceProfile,
    pub profile: PerformanceProfile,
}

impl ThermalTransition {
    pub fn device_state(&self) -> DeviceThermalState {
        self.state.device_state()
    }

    pub fn state_changed(&self) -> bool {
        self.previous_state != self.state
    }

    pub fn profile_changed(&self) -> bool {
        self.previous_profile != self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_state_boundaries() {
        assert_eq!(DeviceThermalState::from_celsius(-5.0), DeviceThermalState::Normal);
        assert_eq!(DeviceThermalState::from_celsius(40.0), DeviceThermalState::Normal);
        assert_eq!(DeviceThermalState::from_celsius(40.01), DeviceThermalState::Hot);
        assert_eq!(DeviceThermalState::from_celsius(45.0), DeviceThermalState::Hot);
        assert_eq!(DeviceThermalState::from_celsius(45.01), DeviceThermalState::Overheating);
        assert_eq!(DeviceThermalState::from_celsius(80.0), DeviceThermalState::Overheating);
    }

    #[test]
    fn test_fine_grained_states() {
        assert_eq!(ThermalState::from_celsius(30.0), ThermalState::Normal);
        assert_eq!(ThermalState::from_celsius(38.5), ThermalState::Light);
        assert_eq!(ThermalState::from_celsius(42.0), ThermalState::Moderate);
        assert_eq!(ThermalState::from_celsius(48.0), ThermalState::Severe);
        assert_eq!(ThermalState::from_celsius(55.0), ThermalState::Critical);
    }

    #[test]
    fn test_non_finite_reading_is_hot() {
        assert_eq!(DeviceThermalState::from_celsius(f32::NAN), DeviceThermalState::Hot);
        assert_eq!(
            DeviceThermalState::from_celsius(f32::INFINITY),
            DeviceThermalState::Hot
        );
    }

    #[test]
    fn test_profile_hysteresis() {
        use PerformanceProfile::*;
        assert_eq!(Emergency.after_thermal(DeviceThermalState::Normal), Balanced);
        assert_eq!(BatterySaver.after_thermal(DeviceThermalState::Normal), Balanced);
        assert_eq!(Performance.after_thermal(DeviceThermalState::Normal), Performance);
        assert_eq!(Balanced.after_thermal(DeviceThermalState::Normal), Balanced);
        assert_eq!(Performance.after_thermal(DeviceThermalState::Hot), BatterySaver);
        assert_eq!(Balanced.after_thermal(DeviceThermalState::Overheating), Emergency);
    }

    #[test]
    fn test_memory_boundaries_are_exact() {
        assert_eq!(MemoryState::classify(9, 100), MemoryState::Critical);
        assert_eq!(MemoryState::classify(10, 100), MemoryState::Low);
        assert_eq!(MemoryState::classify(24, 100), MemoryState::Low);
        assert_eq!(MemoryState::classify(25, 100), MemoryState::Normal);
        assert_eq!(MemoryState::classify(100, 100), MemoryState::Normal);
        assert_eq!(MemoryState::classify(0, 0), MemoryState::Critical);
    }

    #[test]
    fn test_memory_large_values() {
        let total = 10 * 1024 * 1024 * 1024u64;
        assert_eq!(MemoryState::classify(total / 10, total), MemoryState::Low);
        assert_eq!(MemoryState::classify(total / 10 - 1, total), MemoryState::Critical);
        assert_eq!(MemoryState::classify(total / 4, total), MemoryState::Normal);
    }
}
