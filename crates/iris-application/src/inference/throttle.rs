//! Thermal clamping of generation parameters and device-class load defaults.

use iris_core::device::DeviceClass;
use iris_core::inference::GenerationParameters;
use iris_core::thermal::{PerformanceProfile, ThermalState};

/// Token ceiling and temperature adjustment for one thermal state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TemperaturePolicy {
    Unchanged,
    Reduce(f32),
    Fixed(f32),
}

fn policy(state: ThermalState) -> (Option<u32>, TemperaturePolicy) {
    match state {
        ThermalState::Normal | ThermalState::Light => (None, TemperaturePolicy::Unchanged),
        ThermalState::Moderate => (Some(512), TemperaturePolicy::Reduce(0.1)),
        ThermalState::Severe => (Some(256), TemperaturePolicy::Reduce(0.2)),
        ThermalState::Critical => (Some(128), TemperaturePolicy::Fixed(0.1)),
    }
}

/// Applies the thermal clamp to caller parameters.
///
/// The result never has more tokens than the input. Below `Critical` the
/// temperature never rises and never drops below zero; at `Critical` it is
/// pinned to 0.1.
pub fn clamp_parameters(params: GenerationParameters, state: ThermalState) -> GenerationParameters {
    let (ceiling, temperature) = policy(state);
    let max_tokens = ceiling.map_or(params.max_tokens, |c| params.max_tokens.min(c));
    let temperature = match temperature {
        TemperaturePolicy::Unchanged => params.temperature,
        TemperaturePolicy::Reduce(delta) => params.temperature - delta,
        TemperaturePolicy::Fixed(value) => value,
    }
    .max(0.0);

    GenerationParameters {
        max_tokens,
        temperature,
        ..params
    }
}

/// Whether generation must wait for the device to cool before starting.
pub fn requires_pause(state: ThermalState) -> bool {
    state == ThermalState::Critical
}

/// Load parameters chosen from the device class before caller overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDefaults {
    pub context_size: u32,
    pub batch_size: u32,
    pub profile: PerformanceProfile,
}

impl DeviceDefaults {
    pub fn for_class(class: DeviceClass, native_context_size: u32) -> Self {
        let (context_size, batch_size, profile) = match class {
            DeviceClass::Budget => (1024, 1, PerformanceProfile::BatterySaver),
            DeviceClass::MidRange => (2048, 2, PerformanceProfile::Balanced),
            DeviceClass::HighEnd => (4096, 4, PerformanceProfile::Performance),
            DeviceClass::Flagship => (native_context_size, 8, PerformanceProfile::Performance),
        };
        Self {
            context_size,
            batch_size,
            profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn params(max_tokens: u32, temperature: f32) -> GenerationParameters {
        GenerationParameters {
            max_tokens,
            temperature,
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_table() {
        let moderate = clamp_parameters(params(1024, 0.7), ThermalState::Moderate);
        assert_eq!(moderate.max_tokens, 512);
        assert!((moderate.temperature - 0.6).abs() < 1e-6);

        let severe = clamp_parameters(params(1024, 0.7), ThermalState::Severe);
        assert_eq!(severe.max_tokens, 256);
        assert!((severe.temperature - 0.5).abs() < 1e-6);

        let critical = clamp_parameters(params(1024, 0.7), ThermalState::Critical);
        assert_eq!(critical.max_tokens, 128);
        assert!((critical.temperature - 0.1).abs() < 1e-6);

        assert_eq!(clamp_parameters(params(1024, 0.7), ThermalState::Light), params(1024, 0.7));
    }

    #[test]
    fn test_clamp_never_raises_and_floors_temperature() {
        let cases = [(16, 0.05), (300, 0.0), (2048, 1.5), (100, 0.15)];
        for state in ThermalState::iter().filter(|s| *s != ThermalState::Critical) {
            for (tokens, temp) in cases {
                let clamped = clamp_parameters(params(tokens, temp), state);
                assert!(clamped.max_tokens <= tokens, "{state}");
                assert!(clamped.temperature <= temp, "{state}");
                assert!(clamped.temperature >= 0.0, "{state}");
            }
        }
    }

    #[test]
    fn test_critical_forces_temperature() {
        for (tokens, temp) in [(100, 0.05), (100, 0.0), (2048, 1.5), (64, 0.15)] {
            let clamped = clamp_parameters(params(tokens, temp), ThermalState::Critical);
            assert!((clamped.temperature - 0.1).abs() < 1e-6, "input {temp}");
            assert_eq!(clamped.max_tokens, tokens.min(128));
        }
    }

    #[test]
    fn test_only_critical_pauses() {
        assert!(requires_pause(ThermalState::Critical));
        assert!(!requires_pause(ThermalState::Severe));
    }

    #[test]
    fn test_device_defaults() {
        let budget = DeviceDefaults::for_class(DeviceClass::Budget, 8192);
        assert_eq!((budget.context_size, budget.batch_size), (1024, 1));
        assert_eq!(budget.profile, PerformanceProfile::BatterySaver);

        let flagship = DeviceDefaults::for_class(DeviceClass::Flagship, 8192);
        assert_eq!((flagship.context_size, flagship.batch_size), (8192, 8));
    }
}
