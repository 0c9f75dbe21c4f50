//! Diagnostic logging setup.

use sentinel_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{Result, SentinelError};

/// Builds the filter for `config`. `RUST_LOG` wins when set.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| SentinelError::Telemetry(format!("invalid level {:?}: {e}", config.level)))
}

/// Installs the global `tracing` subscriber. Fails if one is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .try_init()
        .map_err(|e| SentinelError::Telemetry(e.to_string()))
}
