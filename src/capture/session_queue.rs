use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::device::{AuthorizationStatus, CameraFacing, CaptureDevice, MediaKind, PreviewHandle};
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

enum SessionJob {
    /// Check permissions then build the first session
    Configure {
        facing: CameraFacing,
        reply: oneshot::Sender<ClipcastResult<PreviewHandle>>,
    },
    /// Tear down the current session and build one for another camera
    Reconfigure {
        facing: CameraFacing,
        reply: oneshot::Sender<ClipcastResult<PreviewHandle>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Serial work queue for hardware session mutations.
///
/// One worker task runs every configuration job to completion before taking
/// the next, so two reconfigurations can never interleave.
pub struct SessionQueue {
    jobs: mpsc::UnboundedSender<SessionJob>,
    worker: JoinHandle<()>,
}

impl SessionQueue {
    pub fn spawn(device: Arc<dyn CaptureDevice>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(device, rx));
        Self { jobs, worker }
    }

    pub async fn configure(&self, facing: CameraFacing) -> ClipcastResult<PreviewHandle> {
        let (reply, rx) = oneshot::channel();
        self.submit(SessionJob::Configure { facing, reply })?;
        rx.await.map_err(|_| queue_gone())?
    }

    pub async fn reconfigure(&self, facing: CameraFacing) -> ClipcastResult<PreviewHandle> {
        let (reply, rx) = oneshot::channel();
        self.submit(SessionJob::Reconfigure { facing, reply })?;
        rx.await.map_err(|_| queue_gone())?
    }

    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.submit(SessionJob::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    fn submit(&self, job: SessionJob) -> ClipcastResult<()> {
        self.jobs.send(job).map_err(|_| queue_gone())
    }
}

impl Drop for SessionQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn queue_gone() -> ClipcastError {
    ClipcastError::ConfigurationFailed("session queue is no longer running".to_string())
}

async fn run_worker(device: Arc<dyn CaptureDevice>, mut jobs: mpsc::UnboundedReceiver<SessionJob>) {
    while let Some(job) = jobs.recv().await {
        match job {
            SessionJob::Configure { facing, reply } => {
                let result = configure(device.as_ref(), facing).await;
                let _ = reply.send(result);
            }
            SessionJob::Reconfigure { facing, reply } => {
                LOGGER.log(
                    LogLevel::Info,
                    &format!("Reconfiguring session for {:?} camera", facing),
                    "capture::session",
                );
                device.close_session().await;
                let _ = reply.send(open(device.as_ref(), facing).await);
            }
            SessionJob::Close { reply } => {
                device.close_session().await;
                let _ = reply.send(());
            }
        }
    }
}

async fn configure(device: &dyn CaptureDevice, facing: CameraFacing) -> ClipcastResult<PreviewHandle> {
    ensure_access(device, MediaKind::Video).await?;
    ensure_access(device, MediaKind::Audio).await?;
    open(device, facing).await
}

async fn open(device: &dyn CaptureDevice, facing: CameraFacing) -> ClipcastResult<PreviewHandle> {
    match device.open_session(facing).await {
        Ok(preview) => {
            LOGGER.log(
                LogLevel::Info,
                &format!("Session ready on {:?} camera", facing),
                "capture::session",
            );
            Ok(preview)
        }
        Err(e) => {
            LOGGER.log(
                LogLevel::Error,
                &format!("Failed to open {:?} camera session: {}", facing, e),
                "capture::session",
            );
            Err(match e {
                ClipcastError::ConfigurationFailed(_)
                | ClipcastError::CameraUnavailable(_)
                | ClipcastError::MicrophoneUnavailable(_) => e,
                other => ClipcastError::ConfigurationFailed(other.to_string()),
            })
        }
    }
}

async fn ensure_access(device: &dyn CaptureDevice, kind: MediaKind) -> ClipcastResult<()> {
    match device.authorization_status(kind) {
        AuthorizationStatus::Authorized => Ok(()),
        AuthorizationStatus::NotDetermined => {
            if device.request_access(kind).await {
                Ok(())
            } else {
                Err(kind.unavailable("access was not granted"))
            }
        }
        AuthorizationStatus::Denied => Err(kind.unavailable("access denied")),
        AuthorizationStatus::Restricted => Err(kind.unavailable("access restricted")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::simulated::SimulatedCaptureDevice;

    #[tokio::test]
    async fn test_configure_requests_undetermined_access() {
        let device = Arc::new(SimulatedCaptureDevice::new());
        device.set_authorization(MediaKind::Video, AuthorizationStatus::NotDetermined);
        let queue = SessionQueue::spawn(device.clone());

        let preview = queue.configure(CameraFacing::Back).await.unwrap();
        assert_eq!(preview.facing, CameraFacing::Back);
        assert!(device.calls().contains(&"request_access:video".to_string()));
    }

    #[tokio::test]
    async fn test_denied_microphone() {
        let device = Arc::new(SimulatedCaptureDevice::new());
        device.set_authorization(MediaKind::Audio, AuthorizationStatus::Denied);
        let queue = SessionQueue::spawn(device.clone());

        let err = queue.configure(CameraFacing::Back).await.unwrap_err();
        assert!(matches!(err, ClipcastError::MicrophoneUnavailable(_)));
        assert!(!device.calls().iter().any(|c| c.starts_with("open_session")));
    }

    #[tokio::test]
    async fn test_open_failure_is_configuration_failed() {
        let device = Arc::new(SimulatedCaptureDevice::new());
        device.set_fail_open(true);
        let queue = SessionQueue::spawn(device);

        let err = queue.configure(CameraFacing::Front).await.unwrap_err();
        assert!(matches!(err, ClipcastError::ConfigurationFailed(_)));
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let device = Arc::new(SimulatedCaptureDevice::new());
        let queue = SessionQueue::spawn(device.clone());

        queue.configure(CameraFacing::Back).await.unwrap();
        let (a, b) = tokio::join!(
            queue.reconfigure(CameraFacing::Front),
            queue.reconfigure(CameraFacing::Back)
        );
        assert_eq!(a.unwrap().facing, CameraFacing::Front);
        assert_eq!(b.unwrap().facing, CameraFacing::Back);

        let opens: Vec<String> = device
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("open_session") || c == "close_session")
            .collect();
        assert_eq!(
            opens,
            vec![
                "open_session:back",
                "close_session",
                "open_session:front",
                "close_session",
                "open_session:back",
            ]
        );
    }
}
