//! Hardware capture: session management, live controls and the clip list.

pub mod clip_store;
pub mod controller;
pub mod device;
pub mod diagnostics;
pub mod session_queue;
pub mod simulated;

pub use clip_store::{Clip, ClipStore};
pub use controller::CaptureController;
pub use device::{
    AuthorizationStatus, CameraFacing, CaptureDevice, DeviceCapabilities, MediaKind,
    PreviewHandle, RecordingFinished, RecordingOutcome,
};
pub use diagnostics::ControlDiagnostic;
pub use simulated::SimulatedCaptureDevice;
