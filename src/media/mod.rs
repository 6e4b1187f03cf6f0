//! Media engine abstraction and the operations built on it.

pub mod composition;
pub mod ffmpeg;
pub mod placeholder;
pub mod simulated;

pub use composition::{CompositionExporter, CompositionResult};
pub use ffmpeg::FfmpegEngine;
pub use simulated::SimulatedMediaEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClipcastResult;

/// What the engine knows about one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
}

/// One source placed on the output timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSegment {
    pub source: PathBuf,
    /// Insertion offset: the sum of all earlier segment durations
    pub start: Duration,
    pub duration: Duration,
    pub has_audio: bool,
}

/// Ordered, gapless sequence of segments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    segments: Vec<TimelineSegment>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source at the current end of the timeline
    pub fn append(&mut self, source: PathBuf, duration: Duration, has_audio: bool) {
        let start = self.duration();
        self.segments.push(TimelineSegment {
            source,
            start,
            duration,
            has_audio,
        });
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn duration(&self) -> Duration {
        self.segments
            .last()
            .map(|s| s.start + s.duration)
            .unwrap_or(Duration::ZERO)
    }

    pub fn has_audio(&self) -> bool {
        self.segments.iter().any(|s| s.has_audio)
    }
}

/// Platform media collaborator: probing, timeline export and frame grabs
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn probe(&self, path: &Path) -> ClipcastResult<AssetInfo>;

    /// Render `timeline` into a single file at `output`
    async fn export(&self, timeline: &Timeline, output: &Path) -> ClipcastResult<()>;

    /// Decode the frame nearest to `at`
    async fn grab_frame(&self, path: &Path, at: Duration) -> ClipcastResult<image::DynamicImage>;
}
