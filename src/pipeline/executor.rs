use std::time::Instant;

use super::context::PublishContext;
use super::core::{PipelineResult, PipelineStage, StageResult};
use crate::error::ClipcastError;
use crate::events::EventEmitter;
use crate::logger::{LogLevel, LOGGER};

/// Pipeline executor that runs stages sequentially
///
/// Progress is reported after every stage, completed or skipped, as a
/// fraction weighted by each stage's `weight()`. The fraction never
/// decreases and only the last stage of a fully successful run reports 1.0.
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Execute the pipeline without emitting events
    pub async fn execute(&self, context: &mut PublishContext) -> PipelineResult {
        self.execute_with_events(context, &EventEmitter::disabled())
            .await
    }

    /// Execute the pipeline, reporting lifecycle and progress on `events`
    ///
    /// Stages run in order; the first failure stops the run and is returned
    /// as the result's cause. The cancellation token is checked before every
    /// stage.
    pub async fn execute_with_events(
        &self,
        context: &mut PublishContext,
        events: &EventEmitter,
    ) -> PipelineResult {
        let session_id = context.session_id();
        let total = self.stages.len();

        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Starting pipeline '{}' with {} stages (session: {})",
                self.name, total, session_id
            ),
            "pipeline",
        );
        let _ = events.pipeline_started(session_id, &self.name, total);

        let pipeline_start = Instant::now();
        let mut stage_results = Vec::new();
        let total_weight: f64 = self.stages.iter().map(|s| stage_weight(s.as_ref())).sum();
        let mut done_weight = 0.0;

        context.set_metadata("pipeline_name", &self.name);

        for (index, stage) in self.stages.iter().enumerate() {
            let stage_name = stage.name();

            if context.is_cancelled() {
                return self.fail(
                    context,
                    events,
                    stage_results,
                    stage_name,
                    ClipcastError::Cancelled,
                    pipeline_start,
                    None,
                );
            }

            if stage.should_skip(context) {
                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Skipping stage {}/{}: {} (session: {})",
                        index + 1,
                        total,
                        stage_name,
                        session_id
                    ),
                    "pipeline",
                );
                let _ = events.pipeline_stage_skipped(session_id, stage_name, index, total);
                stage_results.push(StageResult::skipped(stage_name));
            } else {
                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Executing stage {}/{}: {} (session: {})",
                        index + 1,
                        total,
                        stage_name,
                        session_id
                    ),
                    "pipeline",
                );

                let stage_start = Instant::now();
                let outcome = match stage.pre_execute(context) {
                    Ok(()) => match stage.execute(context).await {
                        Ok(()) => stage.post_execute(context),
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                };
                let duration = stage_start.elapsed();

                if let Err(e) = outcome {
                    return self.fail(
                        context,
                        events,
                        stage_results,
                        stage_name,
                        e,
                        pipeline_start,
                        Some(duration),
                    );
                }

                LOGGER.log(
                    LogLevel::Info,
                    &format!(
                        "Stage '{}' completed successfully in {:.2}s (session: {})",
                        stage_name,
                        duration.as_secs_f64(),
                        session_id
                    ),
                    "pipeline",
                );
                stage_results.push(StageResult::success(stage_name, duration));
            }

            done_weight += stage_weight(stage.as_ref());
            let fraction = if index + 1 == total {
                1.0
            } else if total_weight > 0.0 {
                (done_weight / total_weight).min(1.0)
            } else {
                (index + 1) as f64 / total as f64
            };
            let _ = events.pipeline_progress(session_id, stage_name, fraction);
        }

        let total_duration = pipeline_start.elapsed();
        LOGGER.log(
            LogLevel::Info,
            &format!(
                "Pipeline '{}' completed successfully in {:.2}s (session: {})",
                self.name,
                total_duration.as_secs_f64(),
                session_id
            ),
            "pipeline",
        );

        let stages_completed = stage_results
            .iter()
            .filter(|r| r.success && !r.skipped)
            .count();
        let stages_skipped = stage_results.iter().filter(|r| r.skipped).count();
        let _ = events.pipeline_completed(
            session_id,
            &self.name,
            total_duration.as_millis() as u64,
            stages_completed,
            stages_skipped,
        );

        PipelineResult::success(&self.name, stage_results, total_duration)
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &self,
        context: &PublishContext,
        events: &EventEmitter,
        mut stage_results: Vec<StageResult>,
        stage_name: &str,
        error: ClipcastError,
        pipeline_start: Instant,
        stage_duration: Option<std::time::Duration>,
    ) -> PipelineResult {
        let level = match error {
            ClipcastError::Cancelled => LogLevel::Warn,
            _ => LogLevel::Error,
        };
        LOGGER.log(
            level,
            &format!(
                "Stage '{}' failed: {} (session: {})",
                stage_name,
                error,
                context.session_id()
            ),
            "pipeline",
        );
        let _ = events.pipeline_failed(
            context.session_id(),
            &self.name,
            stage_name,
            &error.to_string(),
        );

        stage_results.push(StageResult::failure(
            stage_name,
            error.to_string(),
            stage_duration.unwrap_or_default(),
        ));
        PipelineResult::failure(&self.name, stage_results, error, pipeline_start.elapsed())
    }
}

fn stage_weight(stage: &dyn PipelineStage) -> f64 {
    let weight = stage.weight();
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn add_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn add_boxed_stage(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            stages: self.stages,
        }
    }
}
