//! Development token generator.
//!
//! Streams the prompt back word by word. Used by the CLI and tests wherever a
//! real native engine is not linked in.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use iris_core::inference::{
    GenerationParameters, ModelHandle, ModelParameters, TokenGenerator, TokenStream,
};
use iris_core::{IrisError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;

const EMBEDDING_DIMENSIONS: usize = 16;

pub struct EchoTokenGenerator {
    token_delay: Duration,
    loaded: RwLock<HashSet<ModelHandle>>,
}

impl EchoTokenGenerator {
    pub fn new(token_delay: Duration) -> Self {
        Self {
            token_delay,
            loaded: RwLock::new(HashSet::new()),
        }
    }

    async fn ensure_loaded(&self, handle: &ModelHandle) -> Result<()> {
        if self.loaded.read().await.contains(handle) {
            Ok(())
        } else {
            Err(IrisError::generation(format!("unknown model handle '{}'", handle.0)))
        }
    }
}

impl Default for EchoTokenGenerator {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl TokenGenerator for EchoTokenGenerator {
    async fn initialize_backend(&self, params: &ModelParameters) -> Result<()> {
        tracing::debug!(
            target: "engine",
            backend = %params.backend,
            threads = params.effective_threads(),
            "Echo engine backend initialised"
        );
        Ok(())
    }

    async fn load_model(&self, path: &Path, _params: &ModelParameters) -> Result<ModelHandle> {
        let handle = ModelHandle(format!("echo:{}", path.display()));
        self.loaded.write().await.insert(handle.clone());
        Ok(handle)
    }

    async fn generate(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        params: &GenerationParameters,
    ) -> Result<TokenStream> {
        self.ensure_loaded(handle).await?;

        let reply = format!("You said: {}", prompt.trim());
        let tokens: Vec<String> = reply
            .split_inclusive(char::is_whitespace)
            .take(params.max_tokens as usize)
            .map(str::to_string)
            .collect();
        let delay = self.token_delay;

        Ok(Box::pin(stream::iter(tokens).then(move |token| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, IrisError>(token)
        })))
    }

    /// Hashed bag-of-words vector, L2 normalised.
    async fn embed(&self, handle: &ModelHandle, text: &str) -> Result<Vec<f32>> {
        self.ensure_loaded(handle).await?;

        let mut vector = vec![0.0f32; EMBEDDING_DIMENSIONS];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
            vector[bucket % EMBEDDING_DIMENSIONS] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    async fn unload(&self, handle: &ModelHandle) -> Result<()> {
        self.loaded.write().await.remove(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::backend::BackendType;
    use std::path::PathBuf;

    fn params() -> ModelParameters {
        ModelParameters {
            context_size: 2048,
            batch_size: 2,
            threads: 0,
            seed: -1,
            backend: BackendType::CpuNeon,
        }
    }

    #[tokio::test]
    async fn test_echoes_prompt_as_tokens() {
        let engine = EchoTokenGenerator::default();
        let handle = engine.load_model(&PathBuf::from("m.gguf"), &params()).await.unwrap();

        let tokens: Vec<String> = engine
            .generate(&handle, "hello world", &GenerationParameters::default())
            .await
            .unwrap()
            .map(|t| t.unwrap())
            .collect()
            .await;
        assert_eq!(tokens.concat(), "You said: hello world");
        assert_eq!(tokens.len(), 4);
    }

    #[tokio::test]
    async fn test_unloaded_handle_fails() {
        let engine = EchoTokenGenerator::default();
        let handle = engine.load_model(&PathBuf::from("m.gguf"), &params()).await.unwrap();
        engine.unload(&handle).await.unwrap();
        assert!(engine
            .generate(&handle, "hi", &GenerationParameters::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_embedding_is_normalised() {
        let engine = EchoTokenGenerator::default();
        let handle = engine.load_model(&PathBuf::from("m.gguf"), &params()).await.unwrap();
        let vector = engine.embed(&handle, "on device inference").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
