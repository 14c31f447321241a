//! Path management for Iris configuration and data files.
//!
//! ```text
//! ~/.config/iris/                  # Config directory
//! ├── config.toml                  # Runtime configuration
//! └── backend_preferences.json     # Per-device backend choices
//!
//! ~/.local/share/iris/             # Data directory
//! └── models/                      # Model files
//! ```

use iris_core::{IrisError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "iris";

pub struct IrisPaths;

impl IrisPaths {
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| IrisError::config("Cannot find config directory"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| IrisError::config("Cannot find data directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn backend_preferences_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("backend_preferences.json"))
    }

    pub fn models_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("models"))
    }
}
