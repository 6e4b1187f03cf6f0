use async_trait::async_trait;
use std::time::Duration;

use super::context::PublishContext;
use crate::error::{ClipcastError, ClipcastResult};

/// A single stage in a pipeline
///
/// Each stage performs one step of the publish workflow on the shared
/// context. Stages are executed sequentially by the pipeline executor, and a
/// failing stage stops the run.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage label, used for logging and progress events
    fn name(&self) -> &str;

    /// Relative share of the run's progress bar
    fn weight(&self) -> f64 {
        1.0
    }

    /// Check if this stage should be skipped based on context
    fn should_skip(&self, _context: &PublishContext) -> bool {
        false
    }

    /// Called before execute() - useful for validation
    fn pre_execute(&self, _context: &PublishContext) -> ClipcastResult<()> {
        Ok(())
    }

    async fn execute(&self, context: &mut PublishContext) -> ClipcastResult<()>;

    /// Called after a successful execute()
    fn post_execute(&self, _context: &PublishContext) -> ClipcastResult<()> {
        Ok(())
    }
}

/// Result of a pipeline stage execution
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
    pub skipped: bool,
}

impl StageResult {
    pub fn success(stage_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            error: None,
            duration,
            skipped: false,
        }
    }

    pub fn failure(
        stage_name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: false,
            error: Some(error.into()),
            duration,
            skipped: false,
        }
    }

    pub fn skipped(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            error: None,
            duration: Duration::from_secs(0),
            skipped: true,
        }
    }
}

/// Result of a complete pipeline execution
#[derive(Debug)]
pub struct PipelineResult {
    pub pipeline_name: String,
    pub success: bool,
    pub stage_results: Vec<StageResult>,
    pub total_duration: Duration,
    pub error: Option<String>,

    /// The typed error that stopped the run
    cause: Option<ClipcastError>,
}

impl PipelineResult {
    pub fn success(
        pipeline_name: impl Into<String>,
        stage_results: Vec<StageResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: true,
            stage_results,
            total_duration,
            error: None,
            cause: None,
        }
    }

    pub fn failure(
        pipeline_name: impl Into<String>,
        stage_results: Vec<StageResult>,
        cause: ClipcastError,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: false,
            stage_results,
            total_duration,
            error: Some(cause.to_string()),
            cause: Some(cause),
        }
    }

    /// Get the number of stages that were executed (not skipped)
    pub fn executed_stages(&self) -> usize {
        self.stage_results.iter().filter(|r| !r.skipped).count()
    }

    pub fn skipped_stages(&self) -> usize {
        self.stage_results.iter().filter(|r| r.skipped).count()
    }

    /// Get the stage that failed (if any)
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| !r.success)
    }

    pub fn cause(&self) -> Option<&ClipcastError> {
        self.cause.as_ref()
    }

    /// Take the typed error out, leaving the string form behind
    pub fn take_cause(&mut self) -> Option<ClipcastError> {
        self.cause.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_success() {
        let result = StageResult::success("Hashing", Duration::from_secs(1));
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(!result.skipped);
        assert_eq!(result.stage_name, "Hashing");
    }

    #[test]
    fn test_stage_result_skipped() {
        let result = StageResult::skipped("Generating thumbnail");
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.duration, Duration::from_secs(0));
    }

    #[test]
    fn test_pipeline_result_with_skipped() {
        let stage_results = vec![
            StageResult::success("Composing clips", Duration::from_secs(1)),
            StageResult::skipped("Generating thumbnail"),
            StageResult::success("Hashing", Duration::from_secs(2)),
        ];
        let result = PipelineResult::success("publish", stage_results, Duration::from_secs(3));

        assert!(result.success);
        assert_eq!(result.executed_stages(), 2);
        assert_eq!(result.skipped_stages(), 1);
        assert!(result.failed_stage().is_none());
        assert!(result.cause().is_none());
    }

    #[test]
    fn test_pipeline_result_failure_keeps_typed_cause() {
        let stage_results = vec![
            StageResult::success("Hashing", Duration::from_secs(1)),
            StageResult::failure("Uploading", "forbidden", Duration::from_secs(1)),
        ];
        let mut result = PipelineResult::failure(
            "publish",
            stage_results,
            ClipcastError::UploadFailed {
                status: Some(403),
                message: "forbidden".to_string(),
            },
            Duration::from_secs(2),
        );

        assert!(!result.success);
        assert_eq!(result.failed_stage().unwrap().stage_name, "Uploading");
        assert!(result.error.as_deref().unwrap().contains("403"));
        assert!(matches!(
            result.take_cause(),
            Some(ClipcastError::UploadFailed { status: Some(403), .. })
        ));
        assert!(result.take_cause().is_none());
        assert!(result.error.is_some());
    }
}
