//! Global tracing subscriber setup.

use crate::tracing_layer::RuntimeEventLayer;
use iris_core::config::LoggingConfig;
use iris_core::{IrisError, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Builds the env filter: `RUST_LOG` wins over the configured directive.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| IrisError::config(format!("invalid log filter '{}': {}", config.filter, e))),
    }
}

/// Installs the global subscriber: stderr output (plain or JSON) plus an
/// optional [`RuntimeEventLayer`].
pub fn init_tracing(config: &LoggingConfig, events: Option<RuntimeEventLayer>) -> Result<()> {
    let filter = env_filter(config)?;

    let (json, plain) = if config.json {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .with(events)
        .try_init()
        .map_err(|e| IrisError::internal(format!("tracing already initialised: {}", e)))
}
