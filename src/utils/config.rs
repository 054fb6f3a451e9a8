// src/utils/config.rs
//! Capture pipeline configuration
//!
//! Loaded once at process start from an optional `callscope` config file
//! layered with `CALLSCOPE_*` environment variables. Nested keys use `__`
//! in the environment, e.g. `CALLSCOPE_ROTATING__MAX_BYTES_PER_FILE`.

use crate::recording::pipe_sink::PipeSink;
use crate::recording::rotating_sink::{RotatingSink, RotatingSinkConfig};
use crate::recording::sink::{FanoutSink, Sink};
use crate::utils::errors::{CaptureError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Named-pipe delivery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Whether records are additionally delivered to a named pipe.
    pub enabled: bool,

    /// Path of the named pipe.
    pub path: PathBuf,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("/tmp/callscope.pipe"),
        }
    }
}

/// Top-level capture configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rotating directory sink settings.
    pub rotating: RotatingSinkConfig,

    /// Optional named-pipe fan-out.
    pub pipe: PipeConfig,
}

impl CaptureConfig {
    /// Load configuration from file and environment layers.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("callscope").required(false))
            .add_source(config::Environment::with_prefix("CALLSCOPE").separator("__"))
            .build()
            .map_err(|e| CaptureError::ConfigError(format!("failed to load config: {}", e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| CaptureError::ConfigError(format!("invalid config: {}", e)))?;
        info!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Assemble the configured sink stack: the rotating directory sink,
    /// fanned out to the named pipe when enabled.
    pub fn build_sink(&self) -> Result<Arc<dyn Sink>> {
        let rotating: Arc<dyn Sink> = Arc::new(RotatingSink::new(self.rotating.clone())?);
        if !self.pipe.enabled {
            return Ok(rotating);
        }
        let pipe: Arc<dyn Sink> = Arc::new(PipeSink::new(self.pipe.path.clone()));
        Ok(Arc::new(FanoutSink::new(vec![rotating, pipe])))
    }
}
