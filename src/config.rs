use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::device::CameraFacing;
use crate::error::{ClipcastError, ClipcastResult};

/// Longest lifetime accepted for upload authorization tokens
pub const MAX_AUTH_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level configuration, loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClipcastConfig {
    pub capture: CaptureConfig,
    pub upload: UploadConfig,
    pub hashing: HashingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Where recorded clips are written
    pub output_dir: PathBuf,

    /// Recording timer resolution
    pub tick_interval_ms: u64,

    /// Budget applied when the caller does not pass one
    pub default_budget_secs: f64,

    pub initial_facing: CameraFacing,

    /// Mirror the preview automatically when the front camera is active
    pub mirror_front_camera: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Base URL; uploads go to `{endpoint}/upload`
    pub endpoint: String,

    /// Budget for establishing the connection
    pub connect_timeout_secs: u64,

    /// Budget for the whole transfer
    pub transfer_timeout_secs: u64,

    /// Lifetime of minted authorization tokens
    pub auth_expiry_secs: u64,

    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HashingConfig {
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub generate_thumbnail: bool,

    /// Where compositions and thumbnails are staged
    pub work_dir: PathBuf,

    pub mime_type: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("clipcast").join("clips"),
            tick_interval_ms: 100,
            default_budget_secs: 60.0,
            initial_facing: CameraFacing::Back,
            mirror_front_camera: true,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://media.example.com".to_string(),
            connect_timeout_secs: 15,
            transfer_timeout_secs: 600,
            auth_expiry_secs: 600,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate_thumbnail: true,
            work_dir: std::env::temp_dir().join("clipcast").join("work"),
            mime_type: "video/mp4".to_string(),
        }
    }
}

impl CaptureConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn default_budget(&self) -> Duration {
        Duration::from_secs_f64(self.default_budget_secs)
    }

    pub fn validate(&self) -> ClipcastResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ClipcastError::ConfigError(
                "capture.tick_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.default_budget_secs > 0.0) || !self.default_budget_secs.is_finite() {
            return Err(ClipcastError::ConfigError(
                "capture.default_budget_secs must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

impl UploadConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn auth_expiry(&self) -> Duration {
        Duration::from_secs(self.auth_expiry_secs)
    }
}

impl ClipcastConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> ClipcastResult<Self> {
        if !path.exists() {
            return Err(ClipcastError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: ClipcastConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ClipcastResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> ClipcastResult<()> {
        self.capture.validate()?;
        if self.upload.endpoint.trim().is_empty() {
            return Err(ClipcastError::ConfigError(
                "upload.endpoint is required".to_string(),
            ));
        }
        url::Url::parse(&self.upload.endpoint).map_err(|e| {
            ClipcastError::ConfigError(format!(
                "upload.endpoint is not a valid URL ({}): {}",
                self.upload.endpoint, e
            ))
        })?;
        if self.upload.transfer_timeout_secs < self.upload.connect_timeout_secs {
            return Err(ClipcastError::ConfigError(
                "upload.transfer_timeout_secs must not be shorter than connect_timeout_secs"
                    .to_string(),
            ));
        }
        if !(1..=MAX_AUTH_EXPIRY_SECS).contains(&self.upload.auth_expiry_secs) {
            return Err(ClipcastError::ConfigError(format!(
                "upload.auth_expiry_secs must be between 1 and {}",
                MAX_AUTH_EXPIRY_SECS
            )));
        }
        if self.upload.retry.max_attempts == 0 {
            return Err(ClipcastError::ConfigError(
                "upload.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.hashing.chunk_size == 0 {
            return Err(ClipcastError::ConfigError(
                "hashing.chunk_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
