use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Event names - centralized for consistency
pub mod event_names {
    pub const PIPELINE_STARTED: &str = "pipeline:started";
    pub const PIPELINE_PROGRESS: &str = "pipeline:progress";
    pub const PIPELINE_STAGE_SKIPPED: &str = "pipeline:stage-skipped";
    pub const PIPELINE_COMPLETED: &str = "pipeline:completed";
    pub const PIPELINE_FAILED: &str = "pipeline:failed";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStartedEvent {
    pub session_id: Uuid,
    pub pipeline_name: String,
    pub total_stages: usize,
    pub timestamp: String,
}

/// Emitted once per stage transition; `fraction` never decreases within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgressEvent {
    pub session_id: Uuid,
    pub stage: String,
    pub fraction: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStageSkippedEvent {
    pub session_id: Uuid,
    pub stage_name: String,
    pub stage_index: usize,
    pub total_stages: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCompletedEvent {
    pub session_id: Uuid,
    pub pipeline_name: String,
    pub total_duration_ms: u64,
    pub stages_completed: usize,
    pub stages_skipped: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFailedEvent {
    pub session_id: Uuid,
    pub pipeline_name: String,
    pub failed_stage: String,
    pub error: String,
    pub timestamp: String,
}

/// Everything the core reports to the UI task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum AppEvent {
    #[serde(rename = "pipeline:started")]
    PipelineStarted(PipelineStartedEvent),
    #[serde(rename = "pipeline:progress")]
    PipelineProgress(PipelineProgressEvent),
    #[serde(rename = "pipeline:stage-skipped")]
    PipelineStageSkipped(PipelineStageSkippedEvent),
    #[serde(rename = "pipeline:completed")]
    PipelineCompleted(PipelineCompletedEvent),
    #[serde(rename = "pipeline:failed")]
    PipelineFailed(PipelineFailedEvent),
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::PipelineStarted(_) => event_names::PIPELINE_STARTED,
            AppEvent::PipelineProgress(_) => event_names::PIPELINE_PROGRESS,
            AppEvent::PipelineStageSkipped(_) => event_names::PIPELINE_STAGE_SKIPPED,
            AppEvent::PipelineCompleted(_) => event_names::PIPELINE_COMPLETED,
            AppEvent::PipelineFailed(_) => event_names::PIPELINE_FAILED,
        }
    }
}

/// Sending half of the UI event channel.
///
/// Emission never blocks the caller; the receiving task decides which
/// context the events are handled on.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    sender: Option<UnboundedSender<AppEvent>>,
}

impl EventEmitter {
    pub fn channel() -> (Self, UnboundedReceiver<AppEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// An emitter that drops everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    fn emit(&self, event: AppEvent) -> Result<(), String> {
        match &self.sender {
            Some(sender) => sender
                .send(event)
                .map_err(|e| format!("Failed to emit {} event: receiver dropped", e.0.name())),
            None => Ok(()),
        }
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn pipeline_started(
        &self,
        session_id: Uuid,
        pipeline_name: &str,
        total_stages: usize,
    ) -> Result<(), String> {
        self.emit(AppEvent::PipelineStarted(PipelineStartedEvent {
            session_id,
            pipeline_name: pipeline_name.to_string(),
            total_stages,
            timestamp: Self::now(),
        }))
    }

    pub fn pipeline_progress(
        &self,
        session_id: Uuid,
        stage: &str,
        fraction: f64,
    ) -> Result<(), String> {
        self.emit(AppEvent::PipelineProgress(PipelineProgressEvent {
            session_id,
            stage: stage.to_string(),
            fraction: fraction.clamp(0.0, 1.0),
            timestamp: Self::now(),
        }))
    }

    pub fn pipeline_stage_skipped(
        &self,
        session_id: Uuid,
        stage_name: &str,
        stage_index: usize,
        total_stages: usize,
    ) -> Result<(), String> {
        self.emit(AppEvent::PipelineStageSkipped(PipelineStageSkippedEvent {
            session_id,
            stage_name: stage_name.to_string(),
            stage_index,
            total_stages,
            timestamp: Self::now(),
        }))
    }

    pub fn pipeline_completed(
        &self,
        session_id: Uuid,
        pipeline_name: &str,
        total_duration_ms: u64,
        stages_completed: usize,
        stages_skipped: usize,
    ) -> Result<(), String> {
        self.emit(AppEvent::PipelineCompleted(PipelineCompletedEvent {
            session_id,
            pipeline_name: pipeline_name.to_string(),
            total_duration_ms,
            stages_completed,
            stages_skipped,
            timestamp: Self::now(),
        }))
    }

    pub fn pipeline_failed(
        &self,
        session_id: Uuid,
        pipeline_name: &str,
        failed_stage: &str,
        error: &str,
    ) -> Result<(), String> {
        self.emit(AppEvent::PipelineFailed(PipelineFailedEvent {
            session_id,
            pipeline_name: pipeline_name.to_string(),
            failed_stage: failed_stage.to_string(),
            error: error.to_string(),
            timestamp: Self::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_receiver_in_order() {
        let (emitter, mut rx) = EventEmitter::channel();
        let id = Uuid::new_v4();
        emitter.pipeline_started(id, "publish", 3).unwrap();
        emitter.pipeline_progress(id, "hash", 0.5).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.name(), event_names::PIPELINE_STARTED);
        match rx.try_recv().unwrap() {
            AppEvent::PipelineProgress(p) => {
                assert_eq!(p.stage, "hash");
                assert_eq!(p.fraction, 0.5);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_fraction_is_clamped() {
        let (emitter, mut rx) = EventEmitter::channel();
        emitter.pipeline_progress(Uuid::new_v4(), "x", 1.7).unwrap();
        match rx.try_recv().unwrap() {
            AppEvent::PipelineProgress(p) => assert_eq!(p.fraction, 1.0),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_disabled_and_dropped_receivers() {
        assert!(EventEmitter::disabled()
            .pipeline_progress(Uuid::new_v4(), "x", 0.1)
            .is_ok());

        let (emitter, rx) = EventEmitter::channel();
        drop(rx);
        assert!(emitter
            .pipeline_failed(Uuid::new_v4(), "publish", "upload", "boom")
            .is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let event = AppEvent::PipelineProgress(PipelineProgressEvent {
            session_id: Uuid::nil(),
            stage: "upload".into(),
            fraction: 0.75,
            timestamp: "t".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "pipeline:progress");
        assert_eq!(json["payload"]["fraction"], 0.75);
        assert_eq!(json["payload"]["sessionId"], Uuid::nil().to_string());
    }
}
