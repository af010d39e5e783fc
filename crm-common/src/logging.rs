//! Logging bootstrap
//!
//! The subscriber is installed once by the binary, from resolved
//! configuration, before anything else logs.

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Build the filter for a configured level.
///
/// `RUST_LOG`, when set, wins over the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(level)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", level, e)))
}

/// Install the global tracing subscriber
pub fn init(level: &str) -> Result<()> {
    let filter = build_filter(level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
