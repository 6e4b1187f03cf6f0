/// State definitions for the capture controller
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the controller entered the error state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    CameraUnavailable,
    MicrophoneUnavailable,
    ConfigurationFailed,
    RecordingFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CameraUnavailable => "cameraUnavailable",
            ErrorKind::MicrophoneUnavailable => "microphoneUnavailable",
            ErrorKind::ConfigurationFailed => "configurationFailed",
            ErrorKind::RecordingFailed => "recordingFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one of these is active per controller.
///
/// `Error` is terminal until an explicit reset moves the controller back to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "camelCase")]
pub enum RecordingState {
    Idle,
    Configuring,
    Ready,
    Recording,
    Error(ErrorKind),
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Idle
    }
}

impl RecordingState {
    pub fn state_name(&self) -> &'static str {
        match self {
            RecordingState::Idle => "Idle",
            RecordingState::Configuring => "Configuring",
            RecordingState::Ready => "Ready",
            RecordingState::Recording => "Recording",
            RecordingState::Error(_) => "Error",
        }
    }

    /// A hardware session is open
    pub fn has_session(&self) -> bool {
        matches!(self, RecordingState::Ready | RecordingState::Recording)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RecordingState::Error(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Error(kind) => write!(f, "Error({})", kind),
            other => f.write_str(other.state_name()),
        }
    }
}
