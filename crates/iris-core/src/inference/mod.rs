//! Inference domain module.
//!
//! - `model`: descriptors, parameters, `InferenceEvent` and `InferenceStream`
//! - `engine`: `TokenGenerator` and `ModelStorage` collaborator traits
//! - `safety`: `SafetyFilter` collaborator trait and verdicts

mod engine;
mod model;
mod safety;

pub use engine::{ModelStorage, TokenGenerator, TokenStream};
pub use model::{
    GenerationParameters, InferenceEvent, InferenceStream, LoadedModel, ModelDescriptor,
    ModelHandle, ModelParameterOverrides, ModelParameters, SafetyStage,
};
pub use safety::{PermissiveSafetyFilter, SafetyFilter, SafetyLevel, SafetyVerdict};
