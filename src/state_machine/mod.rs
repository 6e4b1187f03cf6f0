/// Capture controller state machine
///
/// The controller's observable state is a plain value. Each change produces a
/// new immutable [`ControllerSnapshot`] which is published on a watch channel;
/// readers never see the controller's working fields.
///
/// # States
///
/// - `Idle` - No hardware session
/// - `Configuring` - Session being built or rebuilt (camera flip)
/// - `Ready` - Session live, not writing
/// - `Recording` - Writing a clip
/// - `Error(kind)` - Terminal until reset
pub mod states;
pub mod transitions;

pub use states::*;
pub use transitions::StateEvent;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capture::device::{CameraFacing, PreviewHandle};
use crate::capture::diagnostics::ControlDiagnostic;

/// Immutable view of the controller at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub state: RecordingState,
    pub facing: CameraFacing,
    /// Live preview surface; swapped atomically on reconfiguration
    pub preview: Option<PreviewHandle>,
    pub clip_count: usize,
    /// Sum of committed clip durations
    pub recorded: Duration,
    /// Elapsed time of the clip currently being written
    pub in_progress: Duration,
    pub budget: Option<Duration>,
    pub zoom: f64,
    pub exposure_bias: f64,
    pub torch: bool,
    pub mirrored: bool,
    pub last_diagnostic: Option<ControlDiagnostic>,
    pub diagnostic_count: usize,
    /// Last recording failure that did not change the state
    pub last_error: Option<String>,
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        Self {
            state: RecordingState::Idle,
            facing: CameraFacing::Back,
            preview: None,
            clip_count: 0,
            recorded: Duration::ZERO,
            in_progress: Duration::ZERO,
            budget: None,
            zoom: 1.0,
            exposure_bias: 0.0,
            torch: false,
            mirrored: false,
            last_diagnostic: None,
            diagnostic_count: 0,
            last_error: None,
        }
    }
}

impl ControllerSnapshot {
    /// Committed plus in-flight recording time
    pub fn total_duration(&self) -> Duration {
        self.recorded + self.in_progress
    }

    /// Time left before the active budget is exhausted
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .map(|budget| budget.saturating_sub(self.total_duration()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let snapshot = ControllerSnapshot::default();
        assert_eq!(snapshot.state, RecordingState::Idle);
        assert_eq!(snapshot.total_duration(), Duration::ZERO);
        assert_eq!(snapshot.remaining(), None);
    }

    #[test]
    fn test_remaining_saturates() {
        let snapshot = ControllerSnapshot {
            recorded: Duration::from_secs(5),
            in_progress: Duration::from_secs(2),
            budget: Some(Duration::from_secs(6)),
            ..Default::default()
        };
        assert_eq!(snapshot.total_duration(), Duration::from_secs(7));
        assert_eq!(snapshot.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_snapshot_serializes_state_tag() {
        let snapshot = ControllerSnapshot {
            state: RecordingState::Error(ErrorKind::CameraUnavailable),
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"]["state"], "error");
        assert_eq!(json["state"]["kind"], "cameraUnavailable");
    }
}
