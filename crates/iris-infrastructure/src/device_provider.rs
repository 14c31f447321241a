//! Device profile provider backed by configuration and `/proc/meminfo`.

use crate::sysfs_sensor::read_meminfo;
use async_trait::async_trait;
use iris_core::Result;
use iris_core::config::DeviceConfig;
use iris_core::device::{DeviceClass, DeviceProfile, DeviceProfileProvider};
use iris_core::thermal::MemoryReading;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Builds the device profile from static configuration and live RAM figures.
///
/// SoC, GPU and capabilities come from [`DeviceConfig`]; RAM is re-read on
/// every refresh. When meminfo cannot be read the configured figures are kept.
pub struct ConfiguredDeviceProfileProvider {
    config: DeviceConfig,
    meminfo_path: PathBuf,
    profile: RwLock<DeviceProfile>,
}

impl ConfiguredDeviceProfileProvider {
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_meminfo(config, PathBuf::from("/proc/meminfo"))
    }

    pub fn with_meminfo(config: DeviceConfig, meminfo_path: PathBuf) -> Self {
        let total = config
            .total_ram_bytes
            .unwrap_or(DeviceProfile::default().total_ram_bytes);
        let profile = build_profile(
            &config,
            MemoryReading {
                available_bytes: total / 2,
                total_bytes: total,
            },
        );
        Self {
            config,
            meminfo_path,
            profile: RwLock::new(profile),
        }
    }
}

fn build_profile(config: &DeviceConfig, memory: MemoryReading) -> DeviceProfile {
    let total_ram_bytes = config.total_ram_bytes.unwrap_or(memory.total_bytes);
    DeviceProfile {
        soc_vendor: config.soc_vendor,
        soc_model: config.soc_model.clone(),
        gpu_vendor: config.gpu_vendor,
        gpu_model: config.gpu_model.clone(),
        total_ram_bytes,
        available_ram_bytes: memory.available_bytes.min(total_ram_bytes),
        capabilities: config.capabilities.clone(),
        device_class: config
            .device_class
            .unwrap_or_else(|| DeviceClass::from_total_ram(total_ram_bytes)),
    }
}

#[async_trait]
impl DeviceProfileProvider for ConfiguredDeviceProfileProvider {
    async fn device_profile(&self) -> DeviceProfile {
        self.profile.read().await.clone()
    }

    async fn refresh(&self) -> Result<DeviceProfile> {
        let memory = match read_meminfo(&self.meminfo_path).await {
            Ok(memory) => memory,
            Err(e) => {
                tracing::debug!(target: "device", "Keeping configured RAM figures: {}", e);
                let current = self.profile.read().await;
                MemoryReading {
                    available_bytes: current.available_ram_bytes,
                    total_bytes: current.total_ram_bytes,
                }
            }
        };

        let profile = build_profile(&self.config, memory);
        *self.profile.write().await = profile.clone();
        Ok(profile)
    }
}
