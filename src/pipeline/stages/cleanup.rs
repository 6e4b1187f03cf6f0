use async_trait::async_trait;

use crate::error::ClipcastResult;
use crate::logger::{LogLevel, LOGGER};
use crate::pipeline::{PipelineStage, PublishContext};

/// Stage that removes the run's temporary files
///
/// Runs last. The same routine is used by the coordinator when a run aborts.
/// Clip files are never registered as temporary, so they are never removed.
pub struct CleanupStage;

impl CleanupStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CleanupStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Delete every registered temporary file; returns (deleted, failed)
pub async fn discard_temp_files(context: &mut PublishContext) -> (usize, usize) {
    let temp_files = context.temp_files().to_vec();
    let mut cleaned_count = 0;
    let mut failed_count = 0;

    for temp_file in &temp_files {
        match tokio::fs::remove_file(temp_file).await {
            Ok(()) => {
                LOGGER.log(
                    LogLevel::Debug,
                    &format!(
                        "Deleted temporary file: {} (session: {})",
                        temp_file.display(),
                        context.session_id()
                    ),
                    "pipeline::cleanup",
                );
                cleaned_count += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                LOGGER.log(
                    LogLevel::Warn,
                    &format!(
                        "Failed to delete temporary file {}: {} (session: {})",
                        temp_file.display(),
                        e,
                        context.session_id()
                    ),
                    "pipeline::cleanup",
                );
                failed_count += 1;
            }
        }
    }

    context.clear_temp_files();
    (cleaned_count, failed_count)
}

#[async_trait]
impl PipelineStage for CleanupStage {
    fn name(&self) -> &str {
        "Cleaning up"
    }

    fn weight(&self) -> f64 {
        0.5
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()> {
        if context.temp_files().is_empty() {
            return Ok(());
        }

        let (cleaned, failed) = discard_temp_files(context).await;
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Cleanup complete: {} deleted, {} failed (session: {})",
                cleaned,
                failed,
                context.session_id()
            ),
            "pipeline::cleanup",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::test_support::clip_in;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cleanup_removes_temp_files_only() {
        let dir = TempDir::new().unwrap();
        let clip = clip_in(&dir, "a.mov", 1000);
        let temp = dir.path().join("composition.mp4");
        std::fs::write(&temp, b"merged").unwrap();

        let mut context = PublishContext::new(vec![clip.clone()], CancellationToken::new());
        context.add_temp_file(temp.clone());
        context.add_temp_file(clip.path.clone());

        CleanupStage::new().execute(&mut context).await.unwrap();
        assert!(!temp.exists());
        assert!(clip.path.exists());
        assert!(context.temp_files().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_already_deleted() {
        let dir = TempDir::new().unwrap();
        let mut context = PublishContext::new(Vec::new(), CancellationToken::new());
        context.add_temp_file(dir.path().join("gone.mp4"));

        assert_eq!(discard_temp_files(&mut context).await, (0, 0));
        assert!(context.temp_files().is_empty());
    }
}
