use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::device::{
    AuthorizationStatus, CameraFacing, CaptureDevice, DeviceCapabilities, MediaKind,
    PreviewHandle, RecordingFinished, RecordingOutcome,
};
use crate::error::{ClipcastError, ClipcastResult};

/// Leading bytes of every simulated media file
pub const SIM_MAGIC: &[u8] = b"CLIPCAST-SIM\0";

/// Encode a complete simulated media file of the given length
pub fn encode_sim_media(duration: std::time::Duration) -> Vec<u8> {
    let mut bytes = SIM_MAGIC.to_vec();
    bytes.extend_from_slice(&duration.as_millis().to_le_bytes());
    bytes
}

/// Read the length back from a simulated media file.
///
/// Anything after the length field is payload and is ignored.
pub fn decode_sim_media(bytes: &[u8]) -> Option<std::time::Duration> {
    let rest = bytes.strip_prefix(SIM_MAGIC)?;
    let millis: [u8; 16] = rest.get(..16)?.try_into().ok()?;
    let millis = u64::try_from(u128::from_le_bytes(millis)).ok()?;
    Some(std::time::Duration::from_millis(millis))
}

/// Software stand-in for camera hardware.
///
/// Writes a small placeholder file per clip and measures clip length on the
/// tokio clock, so paused-time tests see exact durations. Failures can be
/// injected per operation, and every call is recorded for inspection.
pub struct SimulatedCaptureDevice {
    state: Mutex<SimState>,
}

struct ActiveWrite {
    path: PathBuf,
    started: Instant,
    finished: oneshot::Sender<ClipcastResult<RecordingOutcome>>,
}

struct SimState {
    authorization: HashMap<MediaKind, AuthorizationStatus>,
    grant_on_request: bool,
    capabilities: DeviceCapabilities,
    session: Option<PreviewHandle>,
    writing: Option<ActiveWrite>,
    fail_open: bool,
    fail_start: bool,
    fail_finish: bool,
    failing_controls: HashSet<&'static str>,
    calls: Vec<String>,
}

impl Default for SimulatedCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCaptureDevice {
    /// A device with every permission granted and default capabilities
    pub fn new() -> Self {
        let mut authorization = HashMap::new();
        authorization.insert(MediaKind::Video, AuthorizationStatus::Authorized);
        authorization.insert(MediaKind::Audio, AuthorizationStatus::Authorized);

        Self {
            state: Mutex::new(SimState {
                authorization,
                grant_on_request: true,
                capabilities: DeviceCapabilities::default(),
                session: None,
                writing: None,
                fail_open: false,
                fail_start: false,
                fail_finish: false,
                failing_controls: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_authorization(&self, kind: MediaKind, status: AuthorizationStatus) {
        self.lock().authorization.insert(kind, status);
    }

    /// Whether a permission prompt is accepted
    pub fn set_grant_on_request(&self, grant: bool) {
        self.lock().grant_on_request = grant;
    }

    pub fn set_capabilities(&self, capabilities: DeviceCapabilities) {
        self.lock().capabilities = capabilities;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    /// Make the next finalization report an error
    pub fn set_fail_finish(&self, fail: bool) {
        self.lock().fail_finish = fail;
    }

    /// Make a control ("zoom", "exposure", "focus", "torch", "mirror") fail
    pub fn fail_control(&self, control: &'static str) {
        self.lock().failing_controls.insert(control);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn session(&self) -> Option<PreviewHandle> {
        self.lock().session.clone()
    }

    pub fn is_writing(&self) -> bool {
        self.lock().writing.is_some()
    }

    fn control(&self, control: &'static str, call: String) -> ClipcastResult<()> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.session.is_none() {
            return Err(ClipcastError::ConfigurationFailed(
                "no active session".to_string(),
            ));
        }
        if state.failing_controls.contains(control) {
            return Err(ClipcastError::Internal(format!(
                "{} rejected by device",
                control
            )));
        }
        Ok(())
    }
}

fn facing_name(facing: CameraFacing) -> &'static str {
    match facing {
        CameraFacing::Back => "back",
        CameraFacing::Front => "front",
    }
}

fn kind_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCaptureDevice {
    fn authorization_status(&self, kind: MediaKind) -> AuthorizationStatus {
        self.lock()
            .authorization
            .get(&kind)
            .copied()
            .unwrap_or(AuthorizationStatus::NotDetermined)
    }

    async fn request_access(&self, kind: MediaKind) -> bool {
        let mut state = self.lock();
        state.calls.push(format!("request_access:{}", kind_name(kind)));
        let granted = state.grant_on_request;
        let status = if granted {
            AuthorizationStatus::Authorized
        } else {
            AuthorizationStatus::Denied
        };
        state.authorization.insert(kind, status);
        granted
    }

    async fn open_session(&self, facing: CameraFacing) -> ClipcastResult<PreviewHandle> {
        let mut state = self.lock();
        state.calls.push(format!("open_session:{}", facing_name(facing)));
        if state.fail_open {
            return Err(ClipcastError::ConfigurationFailed(format!(
                "cannot attach {} camera input",
                facing_name(facing)
            )));
        }
        let preview = PreviewHandle::new(facing);
        state.session = Some(preview.clone());
        Ok(preview)
    }

    async fn close_session(&self) {
        let mut state = self.lock();
        state.calls.push("close_session".to_string());
        state.session = None;
        // Abandoned writes resolve with an error rather than hanging
        if let Some(write) = state.writing.take() {
            let _ = write.finished.send(Err(ClipcastError::RecordingFailed(
                "session closed while recording".to_string(),
            )));
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.lock().capabilities
    }

    async fn start_recording(&self, path: &Path) -> ClipcastResult<RecordingFinished> {
        let mut state = self.lock();
        state.calls.push("start_recording".to_string());
        if state.session.is_none() {
            return Err(ClipcastError::RecordingFailed("no active session".to_string()));
        }
        if state.writing.is_some() {
            return Err(ClipcastError::RecordingFailed(
                "already writing a clip".to_string(),
            ));
        }
        if state.fail_start {
            return Err(ClipcastError::RecordingFailed(
                "asset writer could not start".to_string(),
            ));
        }

        let mut file = std::fs::File::create(path)?;
        file.write_all(SIM_MAGIC)?;

        let (finished, rx) = oneshot::channel();
        state.writing = Some(ActiveWrite {
            path: path.to_path_buf(),
            started: Instant::now(),
            finished,
        });
        Ok(rx)
    }

    async fn stop_recording(&self) -> ClipcastResult<()> {
        let mut state = self.lock();
        state.calls.push("stop_recording".to_string());
        let write = state
            .writing
            .take()
            .ok_or_else(|| ClipcastError::RecordingFailed("not recording".to_string()))?;

        let duration = write.started.elapsed();
        let result = if state.fail_finish {
            Err(ClipcastError::RecordingFailed(
                "asset writer failed to finalize".to_string(),
            ))
        } else {
            std::fs::OpenOptions::new()
                .append(true)
                .open(&write.path)
                .and_then(|mut f| f.write_all(&duration.as_millis().to_le_bytes()))
                .map(|_| RecordingOutcome {
                    path: write.path.clone(),
                    duration,
                })
                .map_err(ClipcastError::from)
        };
        let _ = write.finished.send(result);
        Ok(())
    }

    async fn set_zoom(&self, factor: f64) -> ClipcastResult<()> {
        self.control("zoom", format!("set_zoom:{}", factor))
    }

    async fn set_exposure_bias(&self, bias: f64) -> ClipcastResult<()> {
        self.control("exposure", format!("set_exposure_bias:{}", bias))
    }

    async fn set_focus_point(&self, x: f64, y: f64) -> ClipcastResult<()> {
        self.control("focus", format!("set_focus_point:{},{}", x, y))
    }

    async fn set_torch(&self, on: bool) -> ClipcastResult<()> {
        self.control("torch", format!("set_torch:{}", on))
    }

    async fn set_mirrored(&self, mirrored: bool) -> ClipcastResult<()> {
        self.control("mirror", format!("set_mirrored:{}", mirrored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test(start_paused = true)]
    async fn test_recording_measures_tokio_time() {
        let dir = TempDir::new().unwrap();
        let device = SimulatedCaptureDevice::new();
        device.open_session(CameraFacing::Back).await.unwrap();

        let path = dir.path().join("clip.mov");
        let finished = device.start_recording(&path).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        device.stop_recording().await.unwrap();

        let outcome = finished.await.unwrap().unwrap();
        assert_eq!(outcome.path, path);
        assert_eq!(outcome.duration, Duration::from_millis(1500));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(decode_sim_media(&bytes), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_sim_media_rejects_foreign_bytes() {
        assert_eq!(decode_sim_media(b"\x00\x00\x00\x18ftypmp42"), None);
        assert_eq!(decode_sim_media(SIM_MAGIC), None);
        let mut encoded = encode_sim_media(Duration::from_millis(4500));
        assert_eq!(decode_sim_media(&encoded), Some(Duration::from_millis(4500)));
        encoded.extend_from_slice(&[7u8; 64]);
        assert_eq!(decode_sim_media(&encoded), Some(Duration::from_millis(4500)));
    }

    #[tokio::test]
    async fn test_start_requires_session() {
        let dir = TempDir::new().unwrap();
        let device = SimulatedCaptureDevice::new();
        let err = device
            .start_recording(&dir.path().join("x.mov"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClipcastError::RecordingFailed(_)));
    }

    #[tokio::test]
    async fn test_finish_failure_resolves_with_error() {
        let dir = TempDir::new().unwrap();
        let device = SimulatedCaptureDevice::new();
        device.open_session(CameraFacing::Back).await.unwrap();
        device.set_fail_finish(true);

        let finished = device.start_recording(&dir.path().join("x.mov")).await.unwrap();
        device.stop_recording().await.unwrap();
        assert!(finished.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_control_failures() {
        let device = SimulatedCaptureDevice::new();
        assert!(device.set_zoom(2.0).await.is_err());

        device.open_session(CameraFacing::Front).await.unwrap();
        assert!(device.set_zoom(2.0).await.is_ok());
        device.fail_control("zoom");
        assert!(device.set_zoom(2.0).await.is_err());
        assert!(device.set_torch(true).await.is_ok());
    }
}
