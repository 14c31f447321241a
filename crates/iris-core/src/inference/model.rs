//! Inference domain model: model descriptors, parameters and the event contract.

use crate::backend::BackendType;
use crate::thermal::{PerformanceProfile, ThermalState};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::pin::Pin;
use strum::Display;

/// Describes a model file the runtime may load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    /// RAM needed to load the model with its default context.
    pub memory_requirement_bytes: u64,
    /// Largest context the model was trained for.
    pub native_context_size: u32,
    /// Expected file size, checked by the storage collaborator when present.
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
}

/// Parameters the native engine loads a model with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub context_size: u32,
    pub batch_size: u32,
    /// Worker threads; values `<= 0` mean "engine default" (4).
    pub threads: i32,
    /// Sampling seed; `-1` means time based.
    pub seed: i64,
    pub backend: BackendType,
}

impl ModelParameters {
    pub const DEFAULT_THREADS: i32 = 4;

    pub fn effective_threads(&self) -> i32 {
        if self.threads <= 0 {
            Self::DEFAULT_THREADS
        } else {
            self.threads
        }
    }
}

/// Caller-supplied overrides applied on top of device-class defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameterOverrides {
    pub context_size: Option<u32>,
    pub batch_size: Option<u32>,
    pub threads: Option<i32>,
    pub seed: Option<i64>,
}

/// Sampling parameters for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
        }
    }
}

/// Opaque handle returned by the native engine for a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle(pub String);

/// Information about the currently loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModel {
    /// Runtime id in the form `model_<millis>_<4 digits>`.
    pub model_id: String,
    pub descriptor: ModelDescriptor,
    pub parameters: ModelParameters,
    pub loaded_at: DateTime<Utc>,
}

/// Which side of the generator a safety check ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStage {
    Input,
    Output,
}

/// One event of a generation.
///
/// Every generation yields `GenerationStarted`, zero or more `TokenGenerated`,
/// then exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InferenceEvent {
    GenerationStarted {
        session_id: String,
        /// Parameters after thermal clamping.
        parameters: GenerationParameters,
        thermal_state: ThermalState,
        profile: PerformanceProfile,
    },
    TokenGenerated {
        token: String,
        index: u32,
    },
    GenerationCompleted {
        text: String,
        token_count: u32,
        processing_time_ms: u64,
    },
    SafetyViolation {
        stage: SafetyStage,
        reason: String,
    },
    Error {
        message: String,
    },
}

impl InferenceEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InferenceEvent::GenerationCompleted { .. }
                | InferenceEvent::SafetyViolation { .. }
                | InferenceEvent::Error { .. }
        )
    }
}

/// Lazy, ordered, finite sequence of inference events. Dropping it cancels the generation.
pub type InferenceStream = Pin<Box<dyn Stream<Item = InferenceEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_threads() {
        let mut params = ModelParameters {
            context_size: 2048,
            batch_size: 2,
            threads: 0,
            seed: -1,
            backend: BackendType::CpuNeon,
        };
        assert_eq!(params.effective_threads(), 4);
        params.threads = 6;
        assert_eq!(params.effective_threads(), 6);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = InferenceEvent::TokenGenerated {
            token: "hi".to_string(),
            index: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "token_generated");
        assert!(!event.is_terminal());
        assert!(InferenceEvent::Error {
            message: "x".to_string()
        }
        .is_terminal());
    }
}
