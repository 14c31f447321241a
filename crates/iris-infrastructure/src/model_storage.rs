//! Filesystem model storage.

use async_trait::async_trait;
use iris_core::inference::{ModelDescriptor, ModelStorage};
use iris_core::{IrisError, Result};
use std::path::PathBuf;

/// Resolves model paths against a models directory and checks the file.
///
/// A model passes when it is a non-empty regular file whose size matches
/// `file_size_bytes` (when the descriptor carries one).
pub struct FsModelStorage {
    models_dir: Option<PathBuf>,
}

impl FsModelStorage {
    pub fn new(models_dir: Option<PathBuf>) -> Self {
        Self { models_dir }
    }

    fn resolve(&self, descriptor: &ModelDescriptor) -> PathBuf {
        match &self.models_dir {
            Some(dir) if descriptor.path.is_relative() => dir.join(&descriptor.path),
            _ => descriptor.path.clone(),
        }
    }
}

#[async_trait]
impl ModelStorage for FsModelStorage {
    async fn verify(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        let path = self.resolve(descriptor);
        let integrity = |message: String| IrisError::ModelIntegrity {
            model_id: descriptor.id.clone(),
            message,
        };

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| integrity(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(integrity(format!("{} is not a file", path.display())));
        }
        if metadata.len() == 0 {
            return Err(integrity(format!("{} is empty", path.display())));
        }
        if let Some(expected) = descriptor.file_size_bytes {
            if metadata.len() != expected {
                return Err(integrity(format!(
                    "size mismatch: expected {} bytes, found {}",
                    expected,
                    metadata.len()
                )));
            }
        }

        tracing::debug!(target: "storage", model_id = %descriptor.id, path = %path.display(), "Model verified");
        Ok(path)
    }
}
