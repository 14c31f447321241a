use anyhow::{Context, Result};
use iris_core::config::RuntimeConfig;
use iris_infrastructure::ConfigService;
use std::path::PathBuf;

fn service(path: Option<PathBuf>) -> ConfigService {
    match path {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(),
    }
}

pub fn load(path: Option<PathBuf>) -> Result<RuntimeConfig> {
    service(path)
        .get_config()
        .context("Failed to load configuration")
}

pub fn show(config: &RuntimeConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

pub fn path(path: Option<PathBuf>) -> Result<()> {
    let path = service(path).config_path()?;
    println!("{}", path.display());
    Ok(())
}

pub fn init(path: Option<PathBuf>) -> Result<()> {
    let service = service(path);
    let path = service.config_path()?;
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }
    service
        .save(&RuntimeConfig::default())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
