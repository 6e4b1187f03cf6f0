use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{PipelineStage, PublishContext};
use crate::publisher::{EventPublisher, MediaEvent};

/// Stage that announces the uploaded media
///
/// # Context Outputs
/// - `event_id`
pub struct PublishStage {
    publisher: Arc<dyn EventPublisher>,
}

impl PublishStage {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PipelineStage for PublishStage {
    fn name(&self) -> &str {
        "Publishing"
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let descriptor = context.require_descriptor()?;
        let media = context.require_media()?;
        let hash = context.require_hash()?;

        let event = MediaEvent {
            url: descriptor.url.clone(),
            hash: hash.value.clone(),
            size: media.size,
            mime_type: media.mime_type.clone(),
            width: media.width,
            height: media.height,
            duration: media.duration,
            placeholder: context.placeholder.clone(),
        };

        let event_id = self.publisher.publish(&event).await?;
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Published event {} (session: {})",
                event_id,
                context.session_id()
            ),
            "pipeline::publish",
        );
        context.event_id = Some(event_id);
        Ok(())
    }
}
