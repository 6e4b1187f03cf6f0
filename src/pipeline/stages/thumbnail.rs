use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};
use crate::media::placeholder::{placeholder, thumbnail};
use crate::media::MediaEngine;
use crate::pipeline::{PipelineStage, PublishContext};

const MAX_FRAME_OFFSET: Duration = Duration::from_secs(1);

/// Stage that grabs a preview frame and derives the placeholder string
///
/// Optional and never fatal: a failure is logged and the run continues
/// without a thumbnail.
///
/// # Context Outputs
/// - `thumbnail` (registered as a temporary file)
/// - `placeholder`
pub struct ThumbnailStage {
    engine: Arc<dyn MediaEngine>,
    work_dir: PathBuf,
    enabled: bool,
}

impl ThumbnailStage {
    pub fn new(engine: Arc<dyn MediaEngine>, work_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            engine,
            work_dir: work_dir.into(),
            enabled,
        }
    }

    async fn generate(&self, context: &PublishContext) -> ClipcastResult<(PathBuf, String)> {
        let composition = context.require_composition()?;
        let at = (composition.duration / 2).min(MAX_FRAME_OFFSET);
        let frame = self.engine.grab_frame(&composition.path, at).await?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(format!("thumbnail_{}.png", Uuid::new_v4()));
        let target = path.clone();
        let hint = tokio::task::spawn_blocking(move || -> ClipcastResult<String> {
            let hint = placeholder(&frame);
            thumbnail(&frame).save(&target)?;
            Ok(hint)
        })
        .await
        .map_err(|e| ClipcastError::ThumbnailGenerationFailed(e.to_string()))??;

        Ok((path, hint))
    }
}

#[async_trait]
impl PipelineStage for ThumbnailStage {
    fn name(&self) -> &str {
        "Generating thumbnail"
    }

    fn should_skip(&self, _context: &PublishContext) -> bool {
        !self.enabled
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        match self.generate(context).await {
            Ok((path, hint)) => {
                LOGGER.log(
                    LogLevel::Debug,
                    &format!(
                        "Thumbnail written to {} (session: {})",
                        path.display(),
                        context.session_id()
                    ),
                    "pipeline::thumbnail",
                );
                context.add_temp_file(path.clone());
                context.thumbnail = Some(path);
                context.placeholder = Some(hint);
            }
            Err(e) => {
                LOGGER.log(
                    LogLevel::Warn,
                    &format!(
                        "Continuing without thumbnail: {} (session: {})",
                        e,
                        context.session_id()
                    ),
                    "pipeline::thumbnail",
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{CompositionResult, SimulatedMediaEngine};
    use crate::pipeline::stages::test_support::clip_in;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn context_for(dir: &TempDir) -> PublishContext {
        let clip = clip_in(dir, "a.mov", 4000);
        let mut context = PublishContext::new(vec![clip.clone()], CancellationToken::new());
        context.composition = Some(CompositionResult {
            path: clip.path,
            duration: clip.duration,
            merged: false,
        });
        context
    }

    #[tokio::test]
    async fn test_thumbnail_and_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut context = context_for(&dir);
        let stage = ThumbnailStage::new(
            Arc::new(SimulatedMediaEngine::default()),
            dir.path().join("work"),
            true,
        );

        stage.execute(&mut context).await.unwrap();
        let path = context.thumbnail.clone().unwrap();
        assert!(path.exists());
        assert_eq!(context.temp_files(), &[path]);
        assert!(context.placeholder.as_deref().unwrap().starts_with("4x3:"));
    }

    #[tokio::test]
    async fn test_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut context = context_for(&dir);
        let engine = Arc::new(SimulatedMediaEngine::default());
        engine.set_fail_frame(true);

        ThumbnailStage::new(engine, dir.path().join("work"), true)
            .execute(&mut context)
            .await
            .unwrap();
        assert!(context.thumbnail.is_none());
        assert!(context.placeholder.is_none());
        assert!(context.temp_files().is_empty());
    }

    #[test]
    fn test_disabled_is_skipped() {
        let dir = TempDir::new().unwrap();
        let stage = ThumbnailStage::new(
            Arc::new(SimulatedMediaEngine::default()),
            dir.path().join("work"),
            false,
        );
        let context = PublishContext::new(Vec::new(), CancellationToken::new());
        assert!(stage.should_skip(&context));
    }
}
