//! Device profile domain model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter};

/// SoC vendor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SocVendor {
    Qualcomm,
    Mediatek,
    Samsung,
    Google,
    Unknown,
}

/// GPU vendor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum GpuVendor {
    /// Qualcomm Adreno
    Adreno,
    /// ARM Mali
    Mali,
    /// Imagination PowerVR
    PowerVr,
    Unknown,
}

/// Hardware capability flags reported by the device profile provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum HardwareCapability {
    /// ARM NEON SIMD on the CPU
    Neon,
    /// OpenCL GPU compute
    OpenCl,
    /// Vulkan GPU compute
    Vulkan,
    /// Qualcomm Hexagon NPU via QNN
    Hexagon,
    /// Android Neural Networks API
    Nnapi,
}

/// Coarse device tier used to pick default resource parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Budget,
    MidRange,
    HighEnd,
    Flagship,
}

impl DeviceClass {
    /// Buckets a device by total RAM.
    pub fn from_total_ram(total_ram_bytes: u64) -> Self {
        let gb = total_ram_bytes / (1024 * 1024 * 1024);
        match gb {
            0..=3 => DeviceClass::Budget,
            4..=6 => DeviceClass::MidRange,
            7..=11 => DeviceClass::HighEnd,
            _ => DeviceClass::Flagship,
        }
    }
}

/// Static hardware snapshot.
///
/// Immutable per snapshot; the provider hands out a fresh value on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub soc_vendor: SocVendor,
    pub soc_model: String,
    pub gpu_vendor: GpuVendor,
    pub gpu_model: String,
    pub total_ram_bytes: u64,
    pub available_ram_bytes: u64,
    pub capabilities: BTreeSet<HardwareCapability>,
    pub device_class: DeviceClass,
}

impl DeviceProfile {
    /// Stable key used for per-device caches.
    pub fn device_key(&self) -> String {
        format!("{}:{}", self.soc_vendor, self.soc_model)
    }

    pub fn has_capability(&self, capability: HardwareCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl Default for DeviceProfile {
    /// A conservative CPU-only profile.
    fn default() -> Self {
        let total = 4 * 1024 * 1024 * 1024;
        Self {
            soc_vendor: SocVendor::Unknown,
            soc_model: "generic".to_string(),
            gpu_vendor: GpuVendor::Unknown,
            gpu_model: "generic".to_string(),
            total_ram_bytes: total,
            available_ram_bytes: total / 2,
            capabilities: BTreeSet::from([HardwareCapability::Neon]),
            device_class: DeviceClass::MidRange,
        }
    }
}
