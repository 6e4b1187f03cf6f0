use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{ClipcastError, ClipcastResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn opposite(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

/// The two inputs a recording session needs permission for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// The error raised when access to this input is refused
    pub fn unavailable(self, reason: impl Into<String>) -> ClipcastError {
        match self {
            MediaKind::Video => ClipcastError::CameraUnavailable(reason.into()),
            MediaKind::Audio => ClipcastError::MicrophoneUnavailable(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

/// Opaque reference to a live preview surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewHandle {
    pub id: Uuid,
    pub facing: CameraFacing,
}

impl PreviewHandle {
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            id: Uuid::new_v4(),
            facing,
        }
    }
}

/// Supported ranges of the active camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub min_exposure_bias: f64,
    pub max_exposure_bias: f64,
    pub has_torch: bool,
    pub supports_focus_point: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 10.0,
            min_exposure_bias: -8.0,
            max_exposure_bias: 8.0,
            has_torch: true,
            supports_focus_point: true,
        }
    }
}

impl DeviceCapabilities {
    pub fn clamp_zoom(&self, factor: f64) -> f64 {
        clamp_finite(factor, self.min_zoom, self.max_zoom)
    }

    pub fn clamp_exposure_bias(&self, bias: f64) -> f64 {
        clamp_finite(bias, self.min_exposure_bias, self.max_exposure_bias)
    }
}

/// Clamp into `[min, max]`; NaN maps to `min`
pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// A finalized clip file as reported by the hardware
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutcome {
    pub path: PathBuf,
    pub duration: Duration,
}

/// Resolved exactly once when the hardware finishes writing the file
pub type RecordingFinished = oneshot::Receiver<ClipcastResult<RecordingOutcome>>;

/// Hardware capture collaborator.
///
/// Implementations own the platform session. The controller never calls two
/// session-mutating methods concurrently.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus;

    /// Prompt for access; returns whether it was granted
    async fn request_access(&self, kind: MediaKind) -> bool;

    /// Build the session for one camera and attach inputs/outputs
    async fn open_session(&self, facing: CameraFacing) -> ClipcastResult<PreviewHandle>;

    async fn close_session(&self);

    fn capabilities(&self) -> DeviceCapabilities;

    /// Begin writing to `path`. The returned channel resolves once the file
    /// has been finalized after [`CaptureDevice::stop_recording`].
    async fn start_recording(&self, path: &Path) -> ClipcastResult<RecordingFinished>;

    async fn stop_recording(&self) -> ClipcastResult<()>;

    async fn set_zoom(&self, factor: f64) -> ClipcastResult<()>;

    async fn set_exposure_bias(&self, bias: f64) -> ClipcastResult<()>;

    /// Point of interest in normalized `[0, 1]` coordinates
    async fn set_focus_point(&self, x: f64, y: f64) -> ClipcastResult<()>;

    async fn set_torch(&self, on: bool) -> ClipcastResult<()>;

    async fn set_mirrored(&self, mirrored: bool) -> ClipcastResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_opposite() {
        assert_eq!(CameraFacing::Back.opposite(), CameraFacing::Front);
        assert_eq!(CameraFacing::Front.opposite().opposite(), CameraFacing::Front);
    }

    #[test]
    fn test_capability_clamping() {
        let caps = DeviceCapabilities::default();
        assert_eq!(caps.clamp_zoom(0.2), 1.0);
        assert_eq!(caps.clamp_zoom(42.0), 10.0);
        assert_eq!(caps.clamp_zoom(f64::NAN), 1.0);
        assert_eq!(caps.clamp_exposure_bias(-20.0), -8.0);
        assert_eq!(caps.clamp_exposure_bias(1.5), 1.5);
    }

    #[test]
    fn test_unavailable_maps_to_kind() {
        assert!(matches!(
            MediaKind::Video.unavailable("denied"),
            ClipcastError::CameraUnavailable(_)
        ));
        assert!(matches!(
            MediaKind::Audio.unavailable("denied"),
            ClipcastError::MicrophoneUnavailable(_)
        ));
    }
}
