use std::path::PathBuf;
use std::time::Duration;

use crate::capture::device::CameraFacing;
use crate::config::ClipcastConfig;
use crate::error::{ClipcastError, ClipcastResult};

/// Fluent construction of a [`ClipcastConfig`]
///
/// # Example
/// ```
/// use clipcast_lib::config_builder::ClipcastConfigBuilder;
///
/// let config = ClipcastConfigBuilder::new()
///     .endpoint("http://127.0.0.1:3000")
///     .chunk_size(16 * 1024)
///     .generate_thumbnail(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.hashing.chunk_size, 16 * 1024);
/// ```
#[derive(Debug, Default)]
pub struct ClipcastConfigBuilder {
    config: ClipcastConfig,
}

impl ClipcastConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClipcastConfig) -> Self {
        Self { config }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.upload.endpoint = endpoint.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.capture.output_dir = dir.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pipeline.work_dir = dir.into();
        self
    }

    pub fn tick_interval(mut self, tick: Duration) -> Self {
        self.config.capture.tick_interval_ms = tick.as_millis() as u64;
        self
    }

    pub fn default_budget(mut self, budget: Duration) -> Self {
        self.config.capture.default_budget_secs = budget.as_secs_f64();
        self
    }

    pub fn initial_facing(mut self, facing: CameraFacing) -> Self {
        self.config.capture.initial_facing = facing;
        self
    }

    pub fn timeouts(mut self, connect: Duration, transfer: Duration) -> Self {
        self.config.upload.connect_timeout_secs = connect.as_secs();
        self.config.upload.transfer_timeout_secs = transfer.as_secs();
        self
    }

    pub fn auth_expiry(mut self, expiry: Duration) -> Self {
        self.config.upload.auth_expiry_secs = expiry.as_secs();
        self
    }

    pub fn retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.config.upload.retry.max_attempts = max_attempts;
        self.config.upload.retry.initial_backoff_ms = initial_backoff.as_millis() as u64;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.hashing.chunk_size = chunk_size;
        self
    }

    pub fn generate_thumbnail(mut self, enabled: bool) -> Self {
        self.config.pipeline.generate_thumbnail = enabled;
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.config.pipeline.mime_type = mime.into();
        self
    }

    /// Validate and return the configuration
    ///
    /// # Errors
    /// Returns `ClipcastError::BuilderError` describing the first invalid field
    pub fn build(self) -> ClipcastResult<ClipcastConfig> {
        if self.config.pipeline.mime_type.trim().is_empty() {
            return Err(ClipcastError::BuilderError(
                "mime_type must not be empty".to_string(),
            ));
        }
        self.config.validate().map_err(|e| match e {
            ClipcastError::ConfigError(msg) => ClipcastError::BuilderError(msg),
            other => other,
        })?;
        Ok(self.config)
    }
}
