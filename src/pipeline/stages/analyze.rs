use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};
use crate::media::MediaEngine;
use crate::pipeline::{MediaInfo, PipelineStage, PublishContext};

/// Stage that records size, dimensions and duration of the composition
pub struct AnalyzeStage {
    engine: Arc<dyn MediaEngine>,
    mime_type: String,
}

impl AnalyzeStage {
    pub fn new(engine: Arc<dyn MediaEngine>, mime_type: impl Into<String>) -> Self {
        Self {
            engine,
            mime_type: mime_type.into(),
        }
    }
}

#[async_trait]
impl PipelineStage for AnalyzeStage {
    fn name(&self) -> &str {
        "Analyzing media"
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let composition = context.require_composition()?.clone();

        let size = tokio::fs::metadata(&composition.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ClipcastError::FileNotFound(composition.path.display().to_string())
                }
                _ => ClipcastError::Io(e),
            })?
            .len();

        let info = self.engine.probe(&composition.path).await?;
        let media = MediaInfo {
            size,
            mime_type: self.mime_type.clone(),
            width: info.width,
            height: info.height,
            duration: composition.duration,
        };

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Media is {}x{}, {} bytes, {:.2}s (session: {})",
                media.width,
                media.height,
                media.size,
                media.duration.as_secs_f64(),
                context.session_id()
            ),
            "pipeline::analyze",
        );
        context.media = Some(media);
        Ok(())
    }
}
