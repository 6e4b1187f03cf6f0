use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{MediaEngine, Timeline};
use crate::capture::Clip;
use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

/// The single asset produced from a clip list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResult {
    pub path: PathBuf,
    pub duration: Duration,
    /// `false` when the only clip was passed through untouched
    pub merged: bool,
}

/// Merges ordered clips into one asset through a [`MediaEngine`]
pub struct CompositionExporter {
    engine: Arc<dyn MediaEngine>,
    work_dir: PathBuf,
}

impl CompositionExporter {
    pub fn new(engine: Arc<dyn MediaEngine>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
        }
    }

    pub async fn merge(&self, clips: &[Clip]) -> ClipcastResult<CompositionResult> {
        match clips {
            [] => Err(ClipcastError::RecordingFailed(
                "there are no clips to merge".to_string(),
            )),
            [only] => Ok(CompositionResult {
                path: only.path.clone(),
                duration: only.duration,
                merged: false,
            }),
            _ => self.merge_many(clips).await,
        }
    }

    async fn merge_many(&self, clips: &[Clip]) -> ClipcastResult<CompositionResult> {
        let mut timeline = Timeline::new();
        for clip in clips {
            let info = self.engine.probe(&clip.path).await.map_err(|e| {
                ClipcastError::RecordingFailed(format!(
                    "failed to load tracks of {}: {}",
                    clip.path.display(),
                    e
                ))
            })?;
            if !info.has_video {
                return Err(ClipcastError::RecordingFailed(format!(
                    "{} has no video track",
                    clip.path.display()
                )));
            }
            if !info.has_audio {
                LOGGER.log(
                    LogLevel::Debug,
                    &format!("{} has no audio track", clip.path.display()),
                    "media::composition",
                );
            }
            timeline.append(clip.path.clone(), info.duration, info.has_audio);
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = self
            .work_dir
            .join(format!("composition_{}.mp4", Uuid::new_v4()));

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Exporting {} clips ({:?}) to {}",
                clips.len(),
                timeline.duration(),
                output.display()
            ),
            "media::composition",
        );

        if let Err(e) = self.engine.export(&timeline, &output).await {
            discard(&output).await;
            return Err(ClipcastError::RecordingFailed(format!("export failed: {}", e)));
        }

        Ok(CompositionResult {
            path: output,
            duration: timeline.duration(),
            merged: true,
        })
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => LOGGER.log(
            LogLevel::Warn,
            &format!("Failed to discard partial export {}: {}", path.display(), e),
            "media::composition",
        ),
    }
}
