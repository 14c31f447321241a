//! Linux sysfs/procfs sensor readings.

use async_trait::async_trait;
use iris_core::thermal::{MemoryReading, ThermalSensor};
use iris_core::{IrisError, Result};
use std::path::{Path, PathBuf};

const THERMAL_ROOT: &str = "/sys/class/thermal";
const MEMINFO: &str = "/proc/meminfo";

/// Reads the hottest `thermal_zone*/temp` and `/proc/meminfo`.
pub struct SysfsThermalSensor {
    thermal_root: PathBuf,
    meminfo_path: PathBuf,
}

impl SysfsThermalSensor {
    pub fn new() -> Self {
        Self::with_paths(PathBuf::from(THERMAL_ROOT), PathBuf::from(MEMINFO))
    }

    pub fn with_paths(thermal_root: PathBuf, meminfo_path: PathBuf) -> Self {
        Self {
            thermal_root,
            meminfo_path,
        }
    }
}

impl Default for SysfsThermalSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThermalSensor for SysfsThermalSensor {
    async fn read_temperature(&self) -> Result<f32> {
        let mut entries = tokio::fs::read_dir(&self.thermal_root).await.map_err(|e| {
            IrisError::sensor(format!("{}: {}", self.thermal_root.display(), e))
        })?;

        let mut hottest: Option<f32> = None;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with("thermal_zone") {
                continue;
            }
            let Ok(raw) = tokio::fs::read_to_string(entry.path().join("temp")).await else {
                continue;
            };
            if let Some(celsius) = parse_millidegrees(&raw) {
                hottest = Some(hottest.map_or(celsius, |h| h.max(celsius)));
            }
        }

        hottest.ok_or_else(|| {
            IrisError::sensor(format!("no readable thermal zone under {}", self.thermal_root.display()))
        })
    }

    async fn read_memory(&self) -> Result<MemoryReading> {
        read_meminfo(&self.meminfo_path).await
    }
}

/// sysfs reports millidegrees Celsius.
fn parse_millidegrees(raw: &str) -> Option<f32> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value as f32 / 1000.0)
}

/// Reads `MemTotal` and `MemAvailable` from a meminfo file.
pub async fn read_meminfo(path: &Path) -> Result<MemoryReading> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IrisError::sensor(format!("{}: {}", path.display(), e)))?;
    parse_meminfo(&content)
        .ok_or_else(|| IrisError::sensor(format!("{} is missing MemTotal/MemAvailable", path.display())))
}

fn parse_meminfo(content: &str) -> Option<MemoryReading> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let target = match parts.next() {
            Some("MemTotal:") => &mut total,
            Some("MemAvailable:") => &mut available,
            _ => continue,
        };
        let kib: u64 = parts.next()?.parse().ok()?;
        *target = Some(kib.saturating_mul(1024));
    }
    Some(MemoryReading {
        available_bytes: available?,
        total_bytes: total?,
    })
}
