//! Compute backend domain module.

mod model;
mod repository;

pub use model::{
    BackendKind, BackendSelection, BackendType, BenchmarkResult, ComputeTask, SelectionReason,
};
pub use repository::{BackendPreferenceStore, BenchmarkStore};
