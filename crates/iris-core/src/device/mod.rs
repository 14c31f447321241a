//! Device domain module.
//!
//! - `model`: `DeviceProfile` and the hardware enums it is built from
//! - `provider`: `DeviceProfileProvider` collaborator trait

mod model;
mod provider;

pub use model::{DeviceClass, DeviceProfile, GpuVendor, HardwareCapability, SocVendor};
pub use provider::DeviceProfileProvider;
