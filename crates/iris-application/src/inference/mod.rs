//! Inference session management.
//!
//! - `manager`: `InferenceSessionManager`, model lifecycle and streaming generation
//! - `session`: per-conversation session state and the busy guard
//! - `throttle`: thermal clamping and device-class load defaults

mod manager;
mod session;
mod throttle;

pub use manager::InferenceSessionManager;
pub use session::SessionInfo;
pub use throttle::{DeviceDefaults, clamp_parameters, requires_pause};
