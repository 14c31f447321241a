//! Application services of the Iris runtime.
//!
//! - [`ThermalMonitor`]: sensor samples to thermal state and performance profile
//! - [`BackendRouter`]: device- and thermal-aware compute backend selection
//! - [`InferenceSessionManager`]: model lifecycle and streaming generation
//! - [`ConversationManager`]: conversations, bounded history and metrics

pub mod backend_router;
pub mod conversation;
pub mod inference;
pub mod thermal_monitor;

pub use backend_router::BackendRouter;
pub use conversation::ConversationManager;
pub use inference::InferenceSessionManager;
pub use thermal_monitor::ThermalMonitor;
