//! Error types for the Iris runtime.

use thiserror::Error;

use crate::backend::ComputeTask;

/// A shared error type for the entire Iris runtime.
///
/// Capability errors (`NoViableBackend`, `InsufficientMemory`, `ModelIntegrity`)
/// are fatal to the requested operation and never retried automatically.
/// Everything recoverable is resolved inside the component that detected it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrisError {
    /// No backend in the device capability set can run the task.
    #[error("No viable backend for task {task}")]
    NoViableBackend { task: ComputeTask },

    /// The device does not have enough free memory for the model.
    #[error("Insufficient memory: model requires {required_bytes} bytes, {available_bytes} available")]
    InsufficientMemory {
        required_bytes: u64,
        available_bytes: u64,
    },

    /// The model file is missing or failed its integrity check.
    #[error("Model integrity check failed for '{model_id}': {message}")]
    ModelIntegrity { model_id: String, message: String },

    /// An operation required a loaded model.
    #[error("No model is loaded")]
    ModelNotLoaded,

    /// A generation is already in flight on this session.
    #[error("Session '{0}' already has a generation in flight")]
    SessionBusy(String),

    /// Unknown conversation, session or other runtime entity.
    #[error("Unknown {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Failure reported by the native token generator.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Hardware sensor could not be read.
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Invalid `config.toml` content, log filter or safety pattern.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem failure outside a sensor or model read.
    #[error("I/O failure: {message}")]
    Io { message: String },

    /// JSON preference file or TOML config could not be (de)serialized.
    #[error("Malformed {format}: {message}")]
    Serialization { format: String, message: String },

    /// Broken runtime invariant, such as tracing installed twice.
    #[error("Internal runtime error: {0}")]
    Internal(String),
}

impl IrisError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn sensor(message: impl Into<String>) -> Self {
        Self::Sensor(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// No backend, not enough RAM, or a model that failed verification.
    pub fn is_capability(&self) -> bool {
        matches!(
            self,
            Self::NoViableBackend { .. } | Self::InsufficientMemory { .. } | Self::ModelIntegrity { .. }
        )
    }

    pub fn is_session_busy(&self) -> bool {
        matches!(self, Self::SessionBusy(_))
    }
}

fn malformed(format: &str, err: impl std::fmt::Display) -> IrisError {
    IrisError::Serialization {
        format: format.to_string(),
        message: err.to_string(),
    }
}

impl From<std::io::Error> for IrisError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{} ({:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for IrisError {
    fn from(err: serde_json::Error) -> Self {
        malformed("JSON", err)
    }
}

impl From<toml::de::Error> for IrisError {
    fn from(err: toml::de::Error) -> Self {
        malformed("TOML", err)
    }
}

impl From<toml::ser::Error> for IrisError {
    fn from(err: toml::ser::Error) -> Self {
        malformed("TOML", err)
    }
}

pub type Result<T> = std::result::Result<T, IrisError>;
