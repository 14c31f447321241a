//! Runtime configuration model.
//!
//! Every section has defaults, so a partial (or missing) `config.toml` is valid.

use crate::device::{DeviceClass, GpuVendor, HardwareCapability, SocVendor};
use crate::inference::{GenerationParameters, SafetyLevel};
use crate::thermal::PerformanceProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Root configuration structure for `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermal: ThermalConfig,
    pub conversation: ConversationConfig,
    pub inference: InferenceConfig,
    pub safety: SafetyConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    /// Sampling interval while the device is thermally normal.
    pub poll_interval_ms: u64,
    /// Sampling interval while the device is hot or overheating.
    pub hot_poll_interval_ms: u64,
    /// Profile in effect before the first sample.
    pub initial_profile: PerformanceProfile,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            hot_poll_interval_ms: 1_000,
            initial_profile: PerformanceProfile::Balanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_conversations: usize,
    pub max_messages_per_conversation: usize,
    pub default_title: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_conversations: 50,
            max_messages_per_conversation: 100,
            default_title: "New conversation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub generation: GenerationParameters,
    /// Allow GPU and NPU backends while the device is `Hot`.
    pub gpu_allowed_in_severe_thermal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub level: SafetyLevel,
    /// Extra case-insensitive regex patterns rejected on input and output.
    pub blocked_patterns: Vec<String>,
}

/// Static device facts used when the platform cannot be probed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub soc_vendor: SocVendor,
    pub soc_model: String,
    pub gpu_vendor: GpuVendor,
    pub gpu_model: String,
    pub capabilities: BTreeSet<HardwareCapability>,
    /// Overrides the class derived from total RAM.
    pub device_class: Option<DeviceClass>,
    pub total_ram_bytes: Option<u64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            soc_vendor: SocVendor::Unknown,
            soc_model: "generic".to_string(),
            gpu_vendor: GpuVendor::Unknown,
            gpu_model: "generic".to_string(),
            capabilities: BTreeSet::from([HardwareCapability::Neon]),
            device_class: None,
            total_ram_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` env-filter directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
