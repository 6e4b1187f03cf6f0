use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::clip_store::{Clip, ClipStore};
use super::device::{clamp_finite, CameraFacing, CaptureDevice, RecordingFinished};
use super::diagnostics::ControlDiagnostic;
use super::session_queue::SessionQueue;
use crate::config::CaptureConfig;
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};
use crate::state_machine::{ControllerSnapshot, ErrorKind, RecordingState, StateEvent};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Configure(Reply<ClipcastResult<()>>),
    StartRecording(Option<Duration>, Reply<ClipcastResult<bool>>),
    StopRecording(Reply<ClipcastResult<Option<Clip>>>),
    SetZoom(f64, Reply<()>),
    SetExposureBias(f64, Reply<()>),
    SetFocusPoint(f64, f64, Reply<()>),
    ToggleFlash(Reply<()>),
    FlipCamera(Reply<()>),
    SetMirrorPreview(bool, Reply<()>),
    DeleteLastClip(Reply<ClipcastResult<Option<Clip>>>),
    DeleteAllClips(Reply<ClipcastResult<usize>>),
    Clips(Reply<Vec<Clip>>),
    Diagnostics(Reply<Vec<ControlDiagnostic>>),
    Reset(Reply<ClipcastResult<()>>),
    Shutdown(Reply<()>),
}

/// Handle to the capture controller task.
///
/// All state lives on a single task; this handle sends it commands and
/// observes it through immutable snapshots. Dropping the last handle tears the
/// controller down and releases every clip file.
pub struct CaptureController {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ControllerSnapshot>,
}

impl CaptureController {
    /// Start the controller task. Fails without spawning on an invalid config.
    pub fn spawn(device: Arc<dyn CaptureDevice>, config: CaptureConfig) -> ClipcastResult<Self> {
        config.validate()?;
        let (commands, rx) = mpsc::channel(32);
        let initial = ControllerSnapshot {
            facing: config.initial_facing,
            ..Default::default()
        };
        let (snapshot_tx, snapshots) = watch::channel(initial.clone());

        let actor = ControllerActor {
            queue: SessionQueue::spawn(device.clone()),
            device,
            store: ClipStore::new(),
            snapshot: initial,
            snapshot_tx,
            diagnostics: Vec::new(),
            active: None,
            ticker: None,
            config,
        };
        tokio::spawn(actor.run(rx));

        Ok(Self {
            commands,
            snapshots,
        })
    }

    /// Current state of the controller
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> ClipcastResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Obtain permissions and build the hardware session
    pub async fn configure(&self) -> ClipcastResult<()> {
        self.request(Command::Configure).await?
    }

    /// Begin a clip. Returns `false` without doing anything when already
    /// recording or when the recorded clips already fill `budget`.
    pub async fn start_recording(&self, budget: Option<Duration>) -> ClipcastResult<bool> {
        self.request(|r| Command::StartRecording(budget, r)).await?
    }

    /// Finalize the current clip; `None` when nothing was recording
    pub async fn stop_recording(&self) -> ClipcastResult<Option<Clip>> {
        self.request(Command::StopRecording).await?
    }

    pub async fn set_zoom(&self, factor: f64) {
        let _ = self.request(|r| Command::SetZoom(factor, r)).await;
    }

    pub async fn set_exposure_bias(&self, bias: f64) {
        let _ = self.request(|r| Command::SetExposureBias(bias, r)).await;
    }

    pub async fn set_focus_point(&self, x: f64, y: f64) {
        let _ = self.request(|r| Command::SetFocusPoint(x, y, r)).await;
    }

    pub async fn toggle_flash(&self) {
        let _ = self.request(Command::ToggleFlash).await;
    }

    pub async fn flip_camera(&self) {
        let _ = self.request(Command::FlipCamera).await;
    }

    pub async fn set_mirror_preview(&self, mirrored: bool) {
        let _ = self.request(|r| Command::SetMirrorPreview(mirrored, r)).await;
    }

    pub async fn delete_last_clip(&self) -> ClipcastResult<Option<Clip>> {
        self.request(Command::DeleteLastClip).await?
    }

    pub async fn delete_all_clips(&self) -> ClipcastResult<usize> {
        self.request(Command::DeleteAllClips).await?
    }

    pub async fn clips(&self) -> ClipcastResult<Vec<Clip>> {
        self.request(Command::Clips).await
    }

    /// Every control failure recorded so far
    pub async fn diagnostics(&self) -> ClipcastResult<Vec<ControlDiagnostic>> {
        self.request(Command::Diagnostics).await
    }

    /// Leave the error state for `Idle`
    pub async fn reset(&self) -> ClipcastResult<()> {
        self.request(Command::Reset).await?
    }

    /// Stop any recording, close the session and release every clip file
    pub async fn shutdown(&self) -> ClipcastResult<()> {
        self.request(Command::Shutdown).await
    }
}

fn stopped() -> ClipcastError {
    ClipcastError::Internal("capture controller has shut down".to_string())
}

struct ActiveRecording {
    path: PathBuf,
    finished: RecordingFinished,
    budget: Duration,
    last_tick: Instant,
}

struct ControllerActor {
    device: Arc<dyn CaptureDevice>,
    queue: SessionQueue,
    store: ClipStore,
    snapshot: ControllerSnapshot,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    diagnostics: Vec<ControlDiagnostic>,
    active: Option<ActiveRecording>,
    ticker: Option<Interval>,
    config: CaptureConfig,
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

impl ControllerActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            return;
                        }
                    }
                    None => break,
                },
                now = next_tick(&mut self.ticker) => self.on_tick(now).await,
            }
        }
        self.teardown().await;
    }

    /// Returns `false` once the controller has shut down
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Configure(reply) => {
                let _ = reply.send(self.configure().await);
            }
            Command::StartRecording(budget, reply) => {
                let _ = reply.send(self.start_recording(budget).await);
            }
            Command::StopRecording(reply) => {
                let _ = reply.send(self.finish_recording().await);
            }
            Command::SetZoom(factor, reply) => {
                self.set_zoom(factor).await;
                let _ = reply.send(());
            }
            Command::SetExposureBias(bias, reply) => {
                self.set_exposure_bias(bias).await;
                let _ = reply.send(());
            }
            Command::SetFocusPoint(x, y, reply) => {
                self.set_focus_point(x, y).await;
                let _ = reply.send(());
            }
            Command::ToggleFlash(reply) => {
                self.toggle_flash().await;
                let _ = reply.send(());
            }
            Command::FlipCamera(reply) => {
                self.flip_camera().await;
                let _ = reply.send(());
            }
            Command::SetMirrorPreview(mirrored, reply) => {
                self.set_mirrored(mirrored).await;
                let _ = reply.send(());
            }
            Command::DeleteLastClip(reply) => {
                let result = self.store.delete_last();
                self.sync_clips();
                let _ = reply.send(result);
            }
            Command::DeleteAllClips(reply) => {
                let result = self.store.delete_all();
                self.sync_clips();
                let _ = reply.send(result);
            }
            Command::Clips(reply) => {
                let _ = reply.send(self.store.clips().to_vec());
            }
            Command::Diagnostics(reply) => {
                let _ = reply.send(self.diagnostics.clone());
            }
            Command::Reset(reply) => {
                let _ = reply.send(self.reset().await);
            }
            Command::Shutdown(reply) => {
                self.teardown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn publish(&mut self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    fn transition(&mut self, event: StateEvent) -> ClipcastResult<()> {
        let next = self.snapshot.state.apply(event)?;
        LOGGER.log(
            LogLevel::Debug,
            &format!("State {} -> {}", self.snapshot.state, next),
            "capture",
        );
        self.snapshot.state = next;
        self.publish();
        Ok(())
    }

    fn sync_clips(&mut self) {
        self.snapshot.clip_count = self.store.len();
        self.snapshot.recorded = self.store.total_duration();
        self.publish();
    }

    fn fail(&mut self, kind: ErrorKind, error: &ClipcastError) {
        LOGGER.log(
            LogLevel::Error,
            &format!("Capture failed ({}): {}", kind, error),
            "capture",
        );
        self.snapshot.last_error = Some(error.to_string());
        if let Ok(next) = self.snapshot.state.apply(StateEvent::Fail(kind)) {
            self.snapshot.state = next;
        }
        self.publish();
    }

    fn diagnose(&mut self, control: &str, requested: impl ToString, message: impl Into<String>) {
        let diagnostic = ControlDiagnostic::new(control, requested, message);
        diagnostic.log();
        self.snapshot.last_diagnostic = Some(diagnostic.clone());
        self.diagnostics.push(diagnostic);
        self.snapshot.diagnostic_count = self.diagnostics.len();
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    async fn configure(&mut self) -> ClipcastResult<()> {
        if self.snapshot.state.has_session() {
            return Ok(());
        }
        self.transition(StateEvent::Configure)?;

        match self.queue.configure(self.snapshot.facing).await {
            Ok(preview) => {
                self.snapshot.preview = Some(preview);
                self.transition(StateEvent::Configured)?;
                self.apply_auto_mirror().await;
                Ok(())
            }
            Err(e) => {
                let kind = e
                    .recording_error_kind()
                    .unwrap_or(ErrorKind::ConfigurationFailed);
                self.fail(kind, &e);
                Err(e)
            }
        }
    }

    async fn reset(&mut self) -> ClipcastResult<()> {
        self.transition(StateEvent::Reset)?;
        self.queue.close().await;
        self.snapshot.preview = None;
        self.snapshot.last_error = None;
        self.publish();
        Ok(())
    }

    async fn teardown(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.finish_recording().await {
                LOGGER.log(
                    LogLevel::Warn,
                    &format!("Recording discarded during shutdown: {}", e),
                    "capture",
                );
            }
        }
        self.queue.close().await;
        if let Err(e) = self.store.delete_all() {
            LOGGER.log(
                LogLevel::Warn,
                &format!("Failed to release clip files: {}", e),
                "capture",
            );
        }
        self.snapshot = ControllerSnapshot {
            facing: self.snapshot.facing,
            ..Default::default()
        };
        self.publish();
        LOGGER.log(LogLevel::Info, "Capture controller shut down", "capture");
    }

    // ------------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------------

    async fn start_recording(&mut self, budget: Option<Duration>) -> ClipcastResult<bool> {
        if self.snapshot.state.is_recording() {
            return Ok(false);
        }
        // Validate before touching anything
        self.snapshot.state.apply(StateEvent::StartRecording)?;

        let budget = budget.unwrap_or_else(|| self.config.default_budget());
        if self.store.total_duration() >= budget {
            LOGGER.log(
                LogLevel::Info,
                &format!("Recording budget of {:?} already used", budget),
                "capture",
            );
            return Ok(false);
        }

        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self
            .config
            .output_dir
            .join(format!("clip_{}.mov", uuid::Uuid::new_v4()));

        self.transition(StateEvent::StartRecording)?;

        match self.device.start_recording(&path).await {
            Ok(finished) => {
                let tick = self.config.tick_interval();
                let now = Instant::now();
                let mut ticker = tokio::time::interval_at(now + tick, tick);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                self.ticker = Some(ticker);
                self.active = Some(ActiveRecording {
                    path,
                    finished,
                    budget,
                    last_tick: now,
                });
                self.snapshot.budget = Some(budget);
                self.snapshot.in_progress = Duration::ZERO;
                self.snapshot.last_error = None;
                self.publish();
                LOGGER.log(
                    LogLevel::Info,
                    &format!("Recording started with budget {:?}", budget),
                    "capture",
                );
                Ok(true)
            }
            Err(e) => {
                discard_partial(&path);
                let error = ClipcastError::RecordingFailed(e.to_string());
                self.fail(ErrorKind::RecordingFailed, &error);
                Err(error)
            }
        }
    }

    async fn on_tick(&mut self, now: Instant) {
        let Some(active) = self.active.as_mut() else {
            self.ticker = None;
            return;
        };
        self.snapshot.in_progress += now.saturating_duration_since(active.last_tick);
        active.last_tick = now;
        let budget = active.budget;
        self.publish();

        if self.snapshot.recorded + self.snapshot.in_progress >= budget {
            LOGGER.log(
                LogLevel::Info,
                "Recording budget reached, stopping",
                "capture",
            );
            if let Err(e) = self.finish_recording().await {
                LOGGER.log(
                    LogLevel::Error,
                    &format!("Automatic stop failed: {}", e),
                    "capture",
                );
            }
        }
    }

    /// Stop the hardware write and wait for the finished signal on this task
    async fn finish_recording(&mut self) -> ClipcastResult<Option<Clip>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        self.ticker = None;

        let outcome = match self.device.stop_recording().await {
            Ok(()) => match active.finished.await {
                Ok(result) => result,
                Err(_) => Err(ClipcastError::RecordingFailed(
                    "device dropped the recording without finishing it".to_string(),
                )),
            },
            Err(e) => Err(e),
        };

        self.snapshot.in_progress = Duration::ZERO;
        self.transition(StateEvent::RecordingFinished)?;

        match outcome {
            Ok(outcome) => {
                let clip = self.store.append(outcome.path, outcome.duration);
                LOGGER.log(
                    LogLevel::Info,
                    &format!("Clip {} committed ({:?})", clip.id, clip.duration),
                    "capture",
                );
                self.sync_clips();
                Ok(Some(clip))
            }
            Err(e) => {
                discard_partial(&active.path);
                let error = match e {
                    ClipcastError::RecordingFailed(_) => e,
                    other => ClipcastError::RecordingFailed(other.to_string()),
                };
                LOGGER.log(
                    LogLevel::Error,
                    &format!("Clip discarded: {}", error),
                    "capture",
                );
                self.snapshot.last_error = Some(error.to_string());
                self.publish();
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Hardware controls (best effort)
    // ------------------------------------------------------------------------

    fn require_session(&mut self, control: &str, requested: impl ToString) -> bool {
        if self.snapshot.state.has_session() {
            true
        } else {
            let state = self.snapshot.state;
            self.diagnose(control, requested, format!("no active session ({})", state));
            false
        }
    }

    async fn set_zoom(&mut self, factor: f64) {
        if !self.require_session("zoom", factor) {
            return;
        }
        let clamped = self.device.capabilities().clamp_zoom(factor);
        match self.device.set_zoom(clamped).await {
            Ok(()) => {
                self.snapshot.zoom = clamped;
                self.publish();
            }
            Err(e) => self.diagnose("zoom", clamped, e.to_string()),
        }
    }

    async fn set_exposure_bias(&mut self, bias: f64) {
        if !self.require_session("exposure", bias) {
            return;
        }
        let clamped = self.device.capabilities().clamp_exposure_bias(bias);
        match self.device.set_exposure_bias(clamped).await {
            Ok(()) => {
                self.snapshot.exposure_bias = clamped;
                self.publish();
            }
            Err(e) => self.diagnose("exposure", clamped, e.to_string()),
        }
    }

    async fn set_focus_point(&mut self, x: f64, y: f64) {
        let requested = format!("{},{}", x, y);
        if !self.require_session("focus", &requested) {
            return;
        }
        if !self.device.capabilities().supports_focus_point {
            self.diagnose("focus", requested, "focus point not supported");
            return;
        }
        let (x, y) = (clamp_finite(x, 0.0, 1.0), clamp_finite(y, 0.0, 1.0));
        if let Err(e) = self.device.set_focus_point(x, y).await {
            self.diagnose("focus", requested, e.to_string());
        }
    }

    async fn toggle_flash(&mut self) {
        let target = !self.snapshot.torch;
        if !self.require_session("torch", target) {
            return;
        }
        if !self.device.capabilities().has_torch {
            self.diagnose("torch", target, "camera has no torch");
            return;
        }
        match self.device.set_torch(target).await {
            Ok(()) => {
                self.snapshot.torch = target;
                self.publish();
            }
            Err(e) => self.diagnose("torch", target, e.to_string()),
        }
    }

    async fn set_mirrored(&mut self, mirrored: bool) {
        if !self.require_session("mirror", mirrored) {
            return;
        }
        match self.device.set_mirrored(mirrored).await {
            Ok(()) => {
                self.snapshot.mirrored = mirrored;
                self.publish();
            }
            Err(e) => self.diagnose("mirror", mirrored, e.to_string()),
        }
    }

    async fn apply_auto_mirror(&mut self) {
        if self.config.mirror_front_camera {
            let mirrored = self.snapshot.facing == CameraFacing::Front;
            if mirrored != self.snapshot.mirrored {
                self.set_mirrored(mirrored).await;
            }
        }
    }

    async fn flip_camera(&mut self) {
        let target = self.snapshot.facing.opposite();
        if self.snapshot.state.is_recording() {
            self.diagnose("flip", format!("{:?}", target), "cannot flip while recording");
            return;
        }
        if self.snapshot.state != RecordingState::Ready {
            let state = self.snapshot.state;
            self.diagnose("flip", format!("{:?}", target), format!("no active session ({})", state));
            return;
        }
        if self.transition(StateEvent::Configure).is_err() {
            return;
        }

        let previous = self.snapshot.facing;
        match self.queue.reconfigure(target).await {
            Ok(preview) => {
                self.snapshot.facing = target;
                self.snapshot.preview = Some(preview);
                self.snapshot.zoom = 1.0;
                self.snapshot.torch = false;
                let _ = self.transition(StateEvent::Configured);
                self.apply_auto_mirror().await;
            }
            Err(e) => {
                self.diagnose("flip", format!("{:?}", target), e.to_string());
                // Fall back to the camera that was working
                match self.queue.reconfigure(previous).await {
                    Ok(preview) => {
                        self.snapshot.preview = Some(preview);
                        let _ = self.transition(StateEvent::Configured);
                    }
                    Err(e) => {
                        self.snapshot.preview = None;
                        self.fail(ErrorKind::ConfigurationFailed, &e);
                    }
                }
            }
        }
    }
}

fn discard_partial(path: &std::path::Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            LOGGER.log(
                LogLevel::Warn,
                &format!("Failed to remove partial clip {}: {}", path.display(), e),
                "capture",
            );
        }
    }
}
