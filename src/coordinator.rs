//! One publish run: clips in, published media event out.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::Clip;
use crate::config::ClipcastConfig;
use crate::content::{HashInfo, ProgressObserver};
use crate::error::{ClipcastError, ClipcastResult};
use crate::events::EventEmitter;
use crate::logger::{LogLevel, LOGGER};
use crate::media::{CompositionExporter, MediaEngine};
use crate::pipeline::stages::{
    discard_temp_files, AnalyzeStage, AuthorizeStage, CleanupStage, ComposeStage, HashStage,
    PublishStage, ThumbnailStage, UploadStage,
};
use crate::pipeline::{MediaInfo, Pipeline, PipelineResult, PublishContext};
use crate::publisher::EventPublisher;
use crate::upload::{RetryPolicy, UploadAuthority, UploadDescriptor, UploadTransport};

pub const PUBLISH_PIPELINE: &str = "publish";

/// Everything a successful run produced
#[derive(Debug)]
pub struct PublishOutcome {
    pub session_id: Uuid,
    pub event_id: String,
    pub descriptor: UploadDescriptor,
    pub content_hash: HashInfo,
    pub media: MediaInfo,
    pub placeholder: Option<String>,
    pub upload_attempts: u32,
    pub result: PipelineResult,
}

/// Sequences compose, analyze, thumbnail, hash, authorize, upload, publish
/// and cleanup over a list of clips.
///
/// Clip files are read but never modified or deleted. Files the run creates
/// are removed whether it succeeds or aborts.
pub struct PublishCoordinator {
    pipeline: Pipeline,
}

impl PublishCoordinator {
    pub fn builder() -> PublishCoordinatorBuilder {
        PublishCoordinatorBuilder::default()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn run(
        &self,
        clips: Vec<Clip>,
        events: &EventEmitter,
        cancel: CancellationToken,
    ) -> ClipcastResult<PublishOutcome> {
        let mut context = PublishContext::new(clips, cancel);
        let mut result = self.pipeline.execute_with_events(&mut context, events).await;

        if !result.success {
            let (discarded, _) = discard_temp_files(&mut context).await;
            if discarded > 0 {
                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Discarded {} temporary file(s) after abort (session: {})",
                        discarded,
                        context.session_id()
                    ),
                    "pipeline",
                );
            }
            return Err(result.take_cause().unwrap_or_else(|| {
                ClipcastError::PipelineError(result.error.clone().unwrap_or_default())
            }));
        }

        let missing = |what: &str| ClipcastError::PipelineError(format!("run finished without {}", what));
        Ok(PublishOutcome {
            session_id: context.session_id(),
            event_id: context.event_id.take().ok_or_else(|| missing("an event id"))?,
            descriptor: context.descriptor.take().ok_or_else(|| missing("a descriptor"))?,
            content_hash: context.content_hash.take().ok_or_else(|| missing("a hash"))?,
            media: context.media.take().ok_or_else(|| missing("media info"))?,
            placeholder: context.placeholder.take(),
            upload_attempts: context.upload_attempts,
            result,
        })
    }
}

#[derive(Default)]
pub struct PublishCoordinatorBuilder {
    config: ClipcastConfig,
    engine: Option<Arc<dyn MediaEngine>>,
    authority: Option<UploadAuthority>,
    publisher: Option<Arc<dyn EventPublisher>>,
    hash_observer: Option<ProgressObserver>,
}

impl PublishCoordinatorBuilder {
    pub fn config(mut self, config: ClipcastConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn authority(mut self, authority: UploadAuthority) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Observe hashing progress as (bytes hashed, total bytes)
    pub fn hash_observer(mut self, observer: ProgressObserver) -> Self {
        self.hash_observer = Some(observer);
        self
    }

    pub fn build(self) -> ClipcastResult<PublishCoordinator> {
        self.config.validate()?;
        let engine = self
            .engine
            .ok_or_else(|| ClipcastError::BuilderError("media engine is required".to_string()))?;
        let authority = self
            .authority
            .ok_or_else(|| ClipcastError::BuilderError("upload authority is required".to_string()))?;
        let publisher = self
            .publisher
            .ok_or_else(|| ClipcastError::BuilderError("event publisher is required".to_string()))?;

        let config = self.config;
        let expiry = Some(config.upload.auth_expiry());
        let mut hash_stage = HashStage::new(config.hashing.chunk_size);
        if let Some(observer) = self.hash_observer {
            hash_stage = hash_stage.with_observer(observer);
        }

        let pipeline = Pipeline::builder(PUBLISH_PIPELINE)
            .add_stage(ComposeStage::new(CompositionExporter::new(
                engine.clone(),
                config.pipeline.work_dir.clone(),
            )))
            .add_stage(AnalyzeStage::new(
                engine.clone(),
                config.pipeline.mime_type.clone(),
            ))
            .add_stage(ThumbnailStage::new(
                engine,
                config.pipeline.work_dir.clone(),
                config.pipeline.generate_thumbnail,
            ))
            .add_stage(hash_stage)
            .add_stage(AuthorizeStage::new(authority.clone(), expiry))
            .add_stage(UploadStage::new(
                UploadTransport::from_config(&config.upload),
                authority,
                RetryPolicy::from_config(&config.upload.retry),
                config.upload.endpoint.clone(),
                expiry,
            ))
            .add_stage(PublishStage::new(publisher))
            .add_stage(CleanupStage::new())
            .build();

        Ok(PublishCoordinator { pipeline })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SimulatedMediaEngine;
    use crate::publisher::MockPublisher;
    use crate::upload::KeyManager;

    fn builder() -> PublishCoordinatorBuilder {
        PublishCoordinator::builder()
            .engine(Arc::new(SimulatedMediaEngine::default()))
            .authority(UploadAuthority::new(Arc::new(KeyManager::generate())))
            .publisher(Arc::new(MockPublisher::new()))
    }

    #[test]
    fn test_stage_order() {
        let coordinator = builder().build().unwrap();
        assert_eq!(
            coordinator.pipeline().stage_names(),
            vec![
                "Composing clips",
                "Analyzing media",
                "Generating thumbnail",
                "Hashing content",
                "Authorizing upload",
                "Uploading",
                "Publishing",
                "Cleaning up",
            ]
        );
        assert_eq!(coordinator.pipeline().name(), PUBLISH_PIPELINE);
    }

    #[test]
    fn test_missing_collaborators() {
        let result = PublishCoordinator::builder()
            .engine(Arc::new(SimulatedMediaEngine::default()))
            .build();
        assert!(matches!(result, Err(ClipcastError::BuilderError(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ClipcastConfig::default();
        config.upload.endpoint = String::new();
        assert!(matches!(
            builder().config(config).build(),
            Err(ClipcastError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_no_clips_fails_without_publishing() {
        let publisher = Arc::new(MockPublisher::new());
        let coordinator = builder().publisher(publisher.clone()).build().unwrap();
        let err = coordinator
            .run(Vec::new(), &EventEmitter::disabled(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClipcastError::RecordingFailed(_)));
        assert_eq!(publisher.publish_count(), 0);
    }
}
