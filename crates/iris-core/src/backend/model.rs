//! Compute backend domain model.

use crate::device::{DeviceProfile, GpuVendor, HardwareCapability, SocVendor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// A compute execution path for model inference.
///
/// Variant order is the fixed precedence order used for tie-breaking:
/// NPU backends first, then GPU, then CPU.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendType {
    /// Qualcomm Hexagon NPU through QNN
    #[strum(serialize = "QNN_HEXAGON")]
    QnnHexagon,
    /// Android NNAPI accelerator
    #[serde(rename = "NNAPI")]
    #[strum(serialize = "NNAPI")]
    NnApi,
    /// OpenCL on Qualcomm Adreno
    #[serde(rename = "OPENCL_ADRENO")]
    #[strum(serialize = "OPENCL_ADRENO")]
    OpenClAdreno,
    /// Vulkan compute on ARM Mali
    #[strum(serialize = "VULKAN_MALI")]
    VulkanMali,
    /// NEON-vectorised CPU path, available everywhere
    #[strum(serialize = "CPU_NEON")]
    CpuNeon,
}

/// Coarse execution unit family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BackendKind {
    Npu,
    Gpu,
    Cpu,
}

impl BackendType {
    /// The backend used when nothing better is known.
    pub const DEFAULT: BackendType = BackendType::CpuNeon;

    pub fn kind(self) -> BackendKind {
        match self {
            BackendType::QnnHexagon | BackendType::NnApi => BackendKind::Npu,
            BackendType::OpenClAdreno | BackendType::VulkanMali => BackendKind::Gpu,
            BackendType::CpuNeon => BackendKind::Cpu,
        }
    }

    pub fn is_gpu(self) -> bool {
        self.kind() == BackendKind::Gpu
    }

    pub fn is_cpu(self) -> bool {
        self.kind() == BackendKind::Cpu
    }

    /// Position in the fixed precedence order (lower wins).
    pub fn precedence(self) -> usize {
        BackendType::iter().position(|b| b == self).unwrap_or(usize::MAX)
    }

    /// Whether the device can run this backend at all.
    ///
    /// `CpuNeon` needs nothing beyond a CPU, which keeps every candidate set non-empty.
    pub fn is_supported_by(self, profile: &DeviceProfile) -> bool {
        match self {
            BackendType::CpuNeon => true,
            BackendType::OpenClAdreno => {
                profile.has_capability(HardwareCapability::OpenCl)
                    && profile.gpu_vendor == GpuVendor::Adreno
            }
            BackendType::VulkanMali => {
                profile.has_capability(HardwareCapability::Vulkan)
                    && profile.gpu_vendor == GpuVendor::Mali
            }
            BackendType::QnnHexagon => {
                profile.has_capability(HardwareCapability::Hexagon)
                    && profile.soc_vendor == SocVendor::Qualcomm
            }
            BackendType::NnApi => profile.has_capability(HardwareCapability::Nnapi),
        }
    }

    /// Native engine code for this backend.
    pub fn native_code(self) -> i32 {
        match self {
            BackendType::CpuNeon => 0,
            BackendType::OpenClAdreno => 1,
            BackendType::VulkanMali => 2,
            BackendType::QnnHexagon => 3,
            BackendType::NnApi => 4,
        }
    }
}

/// Kind of work a backend is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ComputeTask {
    LlmInference,
    Embedding,
    SafetyCheck,
    Transcription,
}

/// Why the router picked a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Reused the router's own cached selection.
    Cached,
    /// Reused a persisted per-(device, task) preference.
    StoredPreference,
    /// Fastest benchmarked candidate.
    Benchmark,
    /// First candidate in precedence order, no benchmark data.
    Precedence,
}

/// Chosen compute backend for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSelection {
    pub backend: BackendType,
    pub task: ComputeTask,
    pub reason: SelectionReason,
    pub cached_at: DateTime<Utc>,
}

/// Measured throughput for a backend/task pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub backend: BackendType,
    pub task: ComputeTask,
    pub tokens_per_second: f64,
    pub measured_at: DateTime<Utc>,
}
