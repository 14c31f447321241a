//! Native token generator and model storage collaborator traits.

use super::model::{GenerationParameters, ModelDescriptor, ModelHandle, ModelParameters};
use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Token pieces produced by the native engine. Dropping the stream cancels generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The native token-generation engine, consumed as an opaque streaming text generator.
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    /// Initialises the compute backend the model will run on.
    async fn initialize_backend(&self, params: &ModelParameters) -> Result<()>;

    async fn load_model(&self, path: &Path, params: &ModelParameters) -> Result<ModelHandle>;

    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<TokenStream>;

    async fn embed(&self, handle: &ModelHandle, text: &str) -> Result<Vec<f32>>;

    async fn unload(&self, handle: &ModelHandle) -> Result<()>;
}

/// Model file resolution and integrity checks.
#[async_trait]
pub trait ModelStorage: Send + Sync {
    /// Returns the verified on-disk path of the model, or `ModelIntegrity`.
    async fn verify(&self, descriptor: &ModelDescriptor) -> Result<PathBuf>;
}
