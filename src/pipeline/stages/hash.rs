use async_trait::async_trait;

use crate::content::{ContentHasher, ProgressObserver};
use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{PipelineStage, PublishContext};

/// Stage that calculates the SHA-256 of the composition
///
/// The hash runs under a child of the run's cancellation token. A drop guard
/// on that child cancels the hashing task if this stage is abandoned before
/// the digest arrives.
///
/// # Context Outputs
/// - `content_hash`
pub struct HashStage {
    hasher: ContentHasher,
}

impl HashStage {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            hasher: ContentHasher::new(chunk_size),
        }
    }

    /// Report (bytes hashed, total bytes) after every chunk
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.hasher = self.hasher.with_observer(observer);
        self
    }
}

impl Default for HashStage {
    fn default() -> Self {
        Self {
            hasher: ContentHasher::default(),
        }
    }
}

#[async_trait]
impl PipelineStage for HashStage {
    fn name(&self) -> &str {
        "Hashing content"
    }

    fn weight(&self) -> f64 {
        2.0
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        let path = context.require_composition()?.path.clone();

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Calculating SHA-256 hash of {} (session: {})",
                path.display(),
                context.session_id()
            ),
            "pipeline::hash",
        );

        let token = context.cancel_token().child_token();
        let task = self.hasher.spawn(path, token.clone());
        let guard = token.drop_guard();
        let hash = task.join().await?;
        guard.disarm();

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Content hash calculated: {} (session: {})",
                hash.value,
                context.session_id()
            ),
            "pipeline::hash",
        );
        context.content_hash = Some(hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::HashInfo;
    use crate::error::ClipcastError;
    use crate::media::CompositionResult;
    use crate::pipeline::stages::test_support::clip_in;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn context_with(path: std::path::PathBuf, token: CancellationToken) -> PublishContext {
        let mut context = PublishContext::new(Vec::new(), token);
        context.composition = Some(CompositionResult {
            path,
            duration: std::time::Duration::from_secs(1),
            merged: false,
        });
        context
    }

    #[tokio::test]
    async fn test_hash_stage() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir, "a.mov", 1000);
        let expected = HashInfo::from_bytes(&std::fs::read(&clip.path).unwrap());
        let mut context = context_with(clip.path, CancellationToken::new());

        HashStage::default().execute(&mut context).await.unwrap();
        assert_eq!(context.require_hash().unwrap(), &expected);
    }

    #[tokio::test]
    async fn test_run_cancellation_reaches_hasher() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![3u8; 256 * 1024]).unwrap();

        let run = CancellationToken::new();
        let canceller = run.clone();
        let stage = HashStage::new(4096).with_observer(Arc::new(move |done, total| {
            if done * 2 >= total {
                canceller.cancel();
            }
        }));
        let mut context = context_with(path, run.clone());

        let err = stage.execute(&mut context).await.unwrap_err();
        assert!(matches!(err, ClipcastError::Cancelled));
        assert!(context.content_hash.is_none());
        assert!(run.is_cancelled());
    }
}
