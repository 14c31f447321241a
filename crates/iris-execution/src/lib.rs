//! Execution layer of the Iris runtime: assembly of the services, background
//! supervision and tracing setup.

pub mod runtime;
pub mod telemetry;
pub mod tracing_layer;

pub use runtime::{IrisRuntime, RuntimeComponents};
pub use telemetry::init_tracing;
pub use tracing_layer::{RuntimeEvent, RuntimeEventLayer};
