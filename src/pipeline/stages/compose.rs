use async_trait::async_trait;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::media::CompositionExporter;
use crate::pipeline::{PipelineStage, PublishContext};

/// Stage that merges the run's clips into one asset
///
/// # Context Outputs
/// - `composition`; a merged output is also registered as a temporary file
pub struct ComposeStage {
    exporter: CompositionExporter,
}

impl ComposeStage {
    pub fn new(exporter: CompositionExporter) -> Self {
        Self { exporter }
    }
}

#[async_trait]
impl PipelineStage for ComposeStage {
    fn name(&self) -> &str {
        "Composing clips"
    }

    fn weight(&self) -> f64 {
        3.0
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let composition = self.exporter.merge(context.clips()).await?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Composed {} clip(s) into {} ({:.2}s, merged: {}) (session: {})",
                context.clips().len(),
                composition.path.display(),
                composition.duration.as_secs_f64(),
                composition.merged,
                context.session_id()
            ),
            "pipeline::compose",
        );

        if composition.merged {
            context.add_temp_file(composition.path.clone());
        }
        context.composition = Some(composition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipcastError;
    use crate::media::SimulatedMediaEngine;
    use crate::pipeline::stages::test_support::clip_in;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn stage(dir: &TempDir) -> ComposeStage {
        ComposeStage::new(CompositionExporter::new(
            Arc::new(SimulatedMediaEngine::default()),
            dir.path().join("work"),
        ))
    }

    #[tokio::test]
    async fn test_merged_output_is_temporary() {
        let dir = TempDir::new().unwrap();
        let clips = vec![clip_in(&dir, "a.mov", 2500), clip_in(&dir, "b.mov", 2000)];
        let mut context = PublishContext::new(clips, CancellationToken::new());

        stage(&dir).execute(&mut context).await.unwrap();
        let composition = context.require_composition().unwrap().clone();
        assert!(composition.merged);
        assert_eq!(composition.duration, Duration::from_millis(4500));
        assert_eq!(context.temp_files(), &[composition.path]);
    }

    #[tokio::test]
    async fn test_single_clip_is_not_temporary() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir, "a.mov", 1000);
        let mut context = PublishContext::new(vec![clip.clone()], CancellationToken::new());

        stage(&dir).execute(&mut context).await.unwrap();
        assert_eq!(context.require_composition().unwrap().path, clip.path);
        assert!(context.temp_files().is_empty());
    }

    #[tokio::test]
    async fn test_no_clips() {
        let dir = TempDir::new().unwrap();
        let mut context = PublishContext::new(Vec::new(), CancellationToken::new());
        let err = stage(&dir).execute(&mut context).await.unwrap_err();
        assert!(matches!(err, ClipcastError::RecordingFailed(_)));
    }
}
