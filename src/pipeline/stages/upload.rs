use async_trait::async_trait;
use std::time::Duration;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{PipelineStage, PublishContext};
use crate::upload::{RetryPolicy, UploadAuthority, UploadTransport};

/// Stage that streams the composition to the media server
///
/// The first attempt consumes the token minted by the authorize stage; every
/// retry mints a new one. After a successful upload the server's reported
/// hash must match the local one byte for byte.
///
/// # Context Outputs
/// - `descriptor`
/// - `upload_attempts`
pub struct UploadStage {
    transport: UploadTransport,
    authority: UploadAuthority,
    retry: RetryPolicy,
    endpoint: String,
    expiry: Option<Duration>,
}

impl UploadStage {
    pub fn new(
        transport: UploadTransport,
        authority: UploadAuthority,
        retry: RetryPolicy,
        endpoint: impl Into<String>,
        expiry: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            authority,
            retry,
            endpoint: endpoint.into(),
            expiry,
        }
    }
}

#[async_trait]
impl PipelineStage for UploadStage {
    fn name(&self) -> &str {
        "Uploading"
    }

    fn weight(&self) -> f64 {
        5.0
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let file = context.require_composition()?.path.clone();
        let hash = context.require_hash()?.value.clone();
        let media = context.require_media()?.clone();
        let cancel = context.cancel_token().clone();
        let session_id = context.session_id();

        let mut first_token = context.token.take();
        let mut attempts = 0u32;
        let transport = &self.transport;
        let authority = &self.authority;
        let endpoint = self.endpoint.as_str();
        let expiry = self.expiry;
        let file = file.as_path();
        let mime_type = media.mime_type.as_str();

        let result = self
            .retry
            .run(&cancel, |attempt| {
                attempts = attempt;
                let token = match first_token.take() {
                    Some(token) => Ok(token),
                    None => authority.authorize(&hash, media.size, mime_type, expiry),
                };
                async move {
                    let token = token?;
                    LOGGER.log(
                        LogLevel::Info,
                        &format!("Upload attempt {} (session: {})", attempt, session_id),
                        "pipeline::upload",
                    );
                    transport.upload(file, &token, mime_type, endpoint).await
                }
            })
            .await;

        context.upload_attempts = attempts;
        context.descriptor = Some(result?);
        Ok(())
    }

    fn post_execute(&self, context: &PublishContext) -> ClipcastResult<()> {
        let descriptor = context.require_descriptor()?;
        context.require_hash()?.verify_reported(&descriptor.sha256)?;

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Server hash verified for {} (session: {})",
                descriptor.url,
                context.session_id()
            ),
            "pipeline::upload",
        );
        Ok(())
    }
}
