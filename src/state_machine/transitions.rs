/// State transitions for the capture controller
///
/// Every transition consumes the current state and either yields the next one
/// or fails with `InvalidStateTransition`, leaving the caller's copy untouched.
use super::states::{ErrorKind, RecordingState};
use crate::error::{ClipcastError, ClipcastResult};

/// Something that happened to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Begin building the hardware session (Idle) or rebuilding it (Ready)
    Configure,
    /// The session queue finished building the session
    Configured,
    StartRecording,
    /// The in-flight file write was finalized, successfully or not
    RecordingFinished,
    Fail(ErrorKind),
    Reset,
}

impl RecordingState {
    pub fn apply(self, event: StateEvent) -> ClipcastResult<RecordingState> {
        use RecordingState::*;

        let next = match (self, event) {
            (Idle, StateEvent::Configure) | (Ready, StateEvent::Configure) => Configuring,
            (Configuring, StateEvent::Configured) => Ready,
            (Ready, StateEvent::StartRecording) => Recording,
            (Recording, StateEvent::RecordingFinished) => Ready,
            (Configuring, StateEvent::Fail(kind)) | (Recording, StateEvent::Fail(kind)) => {
                Error(kind)
            }
            (Error(_), StateEvent::Reset) => Idle,
            (from, event) => {
                return Err(ClipcastError::InvalidStateTransition(format!(
                    "{:?} is not allowed in state {}",
                    event, from
                )))
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = RecordingState::Idle
            .apply(StateEvent::Configure)
            .and_then(|s| s.apply(StateEvent::Configured))
            .and_then(|s| s.apply(StateEvent::StartRecording))
            .and_then(|s| s.apply(StateEvent::RecordingFinished))
            .unwrap();
        assert_eq!(state, RecordingState::Ready);
    }

    #[test]
    fn test_flip_path_reconfigures_from_ready() {
        let state = RecordingState::Ready
            .apply(StateEvent::Configure)
            .unwrap();
        assert_eq!(state, RecordingState::Configuring);
        assert_eq!(state.apply(StateEvent::Configured).unwrap(), RecordingState::Ready);
    }

    #[test]
    fn test_error_reachable_from_configuring_and_recording_only() {
        let fail = StateEvent::Fail(ErrorKind::RecordingFailed);
        assert!(RecordingState::Configuring.apply(fail).is_ok());
        assert!(RecordingState::Recording.apply(fail).is_ok());
        assert!(RecordingState::Idle.apply(fail).is_err());
        assert!(RecordingState::Ready.apply(fail).is_err());
    }

    #[test]
    fn test_error_is_terminal_until_reset() {
        let state = RecordingState::Error(ErrorKind::CameraUnavailable);
        assert!(matches!(
            state.apply(StateEvent::Configure),
            Err(ClipcastError::InvalidStateTransition(_))
        ));
        assert!(state.apply(StateEvent::StartRecording).is_err());
        assert_eq!(state.apply(StateEvent::Reset).unwrap(), RecordingState::Idle);
    }

    #[test]
    fn test_cannot_start_twice_or_from_idle() {
        assert!(RecordingState::Recording
            .apply(StateEvent::StartRecording)
            .is_err());
        assert!(RecordingState::Idle.apply(StateEvent::StartRecording).is_err());
        assert!(RecordingState::Ready
            .apply(StateEvent::RecordingFinished)
            .is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RecordingState::Error(ErrorKind::MicrophoneUnavailable).to_string(),
            "Error(microphoneUnavailable)"
        );
        assert_eq!(RecordingState::Ready.to_string(), "Ready");
    }
}
