//! Device profile provider trait.

use super::model::DeviceProfile;
use crate::error::Result;
use async_trait::async_trait;

/// Supplies hardware facts about the current device.
///
/// `device_profile` must be cheap: it returns the latest snapshot.
/// `refresh` re-reads whatever the implementation can re-read (e.g. free RAM)
/// and returns the new snapshot.
#[async_trait]
pub trait DeviceProfileProvider: Send + Sync {
    async fn device_profile(&self) -> DeviceProfile;

    async fn refresh(&self) -> Result<DeviceProfile>;
}
