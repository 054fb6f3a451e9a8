// src/observability.rs
//! Tracing initialization for host programs.

use crate::utils::errors::{CaptureError, Result};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info`. Returns an error if a global
/// subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| CaptureError::ConfigError(format!("failed to initialize tracing: {}", e)))
}
