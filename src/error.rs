use thiserror::Error;

use crate::state_machine::ErrorKind;

/// Central error type for the clipcast pipeline
#[derive(Error, Debug)]
pub enum ClipcastError {
    // ============================================================================
    // Capture Errors
    // ============================================================================
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("Capture configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("Recording failed: {0}")]
    RecordingFailed(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // ============================================================================
    // Content Errors
    // ============================================================================
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Integrity mismatch: expected {expected}, server reported {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Failed to generate thumbnail: {0}")]
    ThumbnailGenerationFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // Upload/Publish Errors
    // ============================================================================
    #[error("Upload failed{}: {message}", status_suffix(.status))]
    UploadFailed { status: Option<u16>, message: String },

    #[error("Invalid server response: {0}")]
    InvalidServerResponse(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mutex lock error")]
    LockError,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Builder pattern validation error
    #[error("Builder error: {0}")]
    BuilderError(String),
}

impl ClipcastError {
    /// Whether a failed upload attempt may be repeated with a fresh token.
    ///
    /// Connection failures, timeouts, 5xx and 429 are transient. Everything
    /// else, and in particular an integrity mismatch, is final.
    pub fn is_transient(&self) -> bool {
        match self {
            ClipcastError::UploadFailed { status: None, .. } => true,
            ClipcastError::UploadFailed {
                status: Some(code), ..
            } => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    /// Map a capture failure onto the kind carried by `RecordingState::Error`
    pub fn recording_error_kind(&self) -> Option<ErrorKind> {
        match self {
            ClipcastError::CameraUnavailable(_) => Some(ErrorKind::CameraUnavailable),
            ClipcastError::MicrophoneUnavailable(_) => Some(ErrorKind::MicrophoneUnavailable),
            ClipcastError::ConfigurationFailed(_) => Some(ErrorKind::ConfigurationFailed),
            ClipcastError::RecordingFailed(_) => Some(ErrorKind::RecordingFailed),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for ClipcastError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ClipcastError::LockError
    }
}

impl From<ClipcastError> for String {
    fn from(error: ClipcastError) -> Self {
        error.to_string()
    }
}

impl From<base64::DecodeError> for ClipcastError {
    fn from(err: base64::DecodeError) -> Self {
        ClipcastError::AuthorizationFailed(format!("Base64 decode error: {}", err))
    }
}

impl From<image::ImageError> for ClipcastError {
    fn from(err: image::ImageError) -> Self {
        ClipcastError::ThumbnailGenerationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for ClipcastError {
    fn from(err: reqwest::Error) -> Self {
        ClipcastError::UploadFailed {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

// Helper type alias for Results
pub type ClipcastResult<T> = Result<T, ClipcastError>;
