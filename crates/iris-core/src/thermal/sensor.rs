//! Raw sensor collaborator trait.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Available/total memory sample in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub available_bytes: u64,
    pub total_bytes: u64,
}

/// Polled source of temperature and memory figures.
///
/// An `Err` from `read_temperature` means the hardware source is unavailable;
/// the monitor then fails safe instead of holding its previous state.
#[async_trait]
pub trait ThermalSensor: Send + Sync {
    async fn read_temperature(&self) -> Result<f32>;

    async fn read_memory(&self) -> Result<MemoryReading>;
}
