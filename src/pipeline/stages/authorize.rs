use async_trait::async_trait;
use std::time::Duration;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{PipelineStage, PublishContext};
use crate::upload::UploadAuthority;

/// Stage that mints the token for the first upload attempt
///
/// # Context Outputs
/// - `token`, bound to the content hash, size and mime type
pub struct AuthorizeStage {
    authority: UploadAuthority,
    expiry: Option<Duration>,
}

impl AuthorizeStage {
    pub fn new(authority: UploadAuthority, expiry: Option<Duration>) -> Self {
        Self { authority, expiry }
    }
}

#[async_trait]
impl PipelineStage for AuthorizeStage {
    fn name(&self) -> &str {
        "Authorizing upload"
    }

    fn weight(&self) -> f64 {
        0.5
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let hash = context.require_hash()?.value.clone();
        let media = context.require_media()?;

        let token = self
            .authority
            .authorize(&hash, media.size, &media.mime_type, self.expiry)?;

        LOGGER.log(
            LogLevel::Debug,
            &format!("Upload authorized (session: {})", context.session_id()),
            "pipeline::authorize",
        );
        context.token = Some(token);
        Ok(())
    }
}
