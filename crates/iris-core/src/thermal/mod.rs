//! Thermal domain module.
//!
//! - `model`: thermal/memory/profile enums and the classification rules
//! - `sensor`: `ThermalSensor` collaborator trait
//! - `state`: `RuntimeState`, the shared lock-guarded status cell

mod model;
mod sensor;
mod state;

pub use model::{
    COOL_MAX_CELSIUS, DeviceThermalState, HOT_MAX_CELSIUS, MemoryState, NORMAL_MAX_CELSIUS,
    PerformanceProfile, SEVERE_MAX_CELSIUS, ThermalReading, ThermalState, ThermalStatus,
    ThermalTransition,
};
pub use sensor::{MemoryReading, ThermalSensor};
pub use state::RuntimeState;
