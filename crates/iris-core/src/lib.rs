//! Domain layer of the Iris on-device inference runtime.
//!
//! Holds the value types shared by every component, the collaborator traits the
//! runtime consumes, the shared [`thermal::RuntimeState`] cell and the error type.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod device;
pub mod error;
pub mod inference;
pub mod thermal;

// Re-export common error type
pub use error::{IrisError, Result};
