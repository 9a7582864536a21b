//! The Pipeline Runner: drives a list of [`Step`]s through the per-step
//! retry-with-backoff protocol (§4.4).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::database::repositories::PipelineRunRepository;
use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};

/// Per-step outcome, retained in the Runner's final report.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed { duration_ms: u64 },
    Skipped { reason: String },
    Failed { message: String },
}

/// Result of running a full Step list against one [`StepContext`].
pub struct RunReport {
    pub success: bool,
    pub final_data: PipelineData,
    pub per_step: Vec<(String, StepOutcome)>,
    pub total_duration_ms: u64,
    pub failed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
}

/// Hooks the Runner fires around step transitions. All methods default to
/// no-ops; implement only the ones a caller cares about (observability,
/// testing).
#[async_trait::async_trait]
pub trait RunnerCallbacks: Send + Sync {
    async fn on_skip(&self, _step: &str, _reason: &str) {}
    async fn on_complete(&self, _step: &str, _duration_ms: u64) {}
    async fn on_error(&self, _step: &str, _error: &PipelineError) {}
}

/// No-op implementation, used when a caller doesn't need hooks.
pub struct NoopCallbacks;

#[async_trait::async_trait]
impl RunnerCallbacks for NoopCallbacks {}

/// Tunables for the retry-with-backoff protocol, sourced from
/// [`PipelineConfig`] by default.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff_multiplier: f64,
    pub track_in_db: bool,
}

impl RunnerOptions {
    pub fn from_config(config: &PipelineConfig, track_in_db: bool) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            retry_backoff_multiplier: config.retry_backoff_multiplier,
            track_in_db,
        }
    }
}

pub struct PipelineRunner {
    steps: Vec<Arc<dyn Step>>,
    options: RunnerOptions,
    pipeline_runs: Option<Arc<PipelineRunRepository>>,
    callbacks: Arc<dyn RunnerCallbacks>,
}

impl PipelineRunner {
    pub fn new(
        steps: Vec<Arc<dyn Step>>,
        options: RunnerOptions,
        pipeline_runs: Option<Arc<PipelineRunRepository>>,
    ) -> Self {
        Self {
            steps,
            options,
            pipeline_runs,
            callbacks: Arc::new(NoopCallbacks),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn RunnerCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Runs every Step in order against `ctx`, starting from `initial_data`.
    /// Stops at the first terminal failure; subsequent steps are not run.
    pub async fn run(&self, ctx: &StepContext, initial_data: PipelineData) -> RunReport {
        let started = Instant::now();
        let mut data = initial_data;
        let mut per_step = Vec::with_capacity(self.steps.len());
        let mut failed_steps = Vec::new();
        let mut skipped_steps = Vec::new();
        let mut success = true;

        for step in &self.steps {
            let outcome = self.run_one_step(step.as_ref(), ctx, &mut data).await;
            match &outcome {
                StepOutcome::Skipped { .. } => skipped_steps.push(step.name().to_string()),
                StepOutcome::Failed { .. } => {
                    failed_steps.push(step.name().to_string());
                    per_step.push((step.name().to_string(), outcome));
                    success = false;
                    break;
                }
                StepOutcome::Completed { .. } => {}
            }
            per_step.push((step.name().to_string(), outcome));
        }

        RunReport {
            success,
            final_data: data,
            per_step,
            total_duration_ms: started.elapsed().as_millis() as u64,
            failed_steps,
            skipped_steps,
        }
    }

    async fn run_one_step(
        &self,
        step: &dyn Step,
        ctx: &StepContext,
        data: &mut PipelineData,
    ) -> StepOutcome {
        let name = step.name();
        let input_snapshot = serde_json::to_string(&*data).unwrap_or_default();

        let run_id = if self.options.track_in_db {
            match &self.pipeline_runs {
                Some(repo) => repo
                    .start(&ctx.session_id, Some(ctx.channel_number), name, input_snapshot)
                    .await
                    .ok()
                    .map(|row| row.id),
                None => None,
            }
        } else {
            None
        };

        if !step.should_run(ctx, data).await {
            let reason = "output already present".to_string();
            if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
                if let Err(e) = repo.mark_skipped(id, &reason).await {
                    warn!(step = name, error = %e, "failed to persist skipped pipeline run");
                }
            }
            self.callbacks.on_skip(name, &reason).await;
            debug!(step = name, session_id = %ctx.session_id, channel = ctx.channel_number, "step skipped");
            return StepOutcome::Skipped { reason };
        }

        if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
            if let Err(e) = repo.mark_running(id).await {
                warn!(step = name, error = %e, "failed to mark pipeline run running");
            }
        }

        let step_started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match step.execute(ctx, data).await {
                StepResult::Success { data_delta, metrics } => {
                    data.merge(data_delta);
                    let duration_ms = step_started.elapsed().as_millis() as u64;
                    if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
                        let output_snapshot = metrics
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| serde_json::to_string(data).unwrap_or_default());
                        if let Err(e) = repo.mark_completed(id, output_snapshot, duration_ms as i64).await {
                            warn!(step = name, error = %e, "failed to persist completed pipeline run");
                        }
                    }
                    self.callbacks.on_complete(name, duration_ms).await;
                    info!(step = name, session_id = %ctx.session_id, channel = ctx.channel_number, duration_ms, "step completed");
                    return StepOutcome::Completed { duration_ms };
                }
                StepResult::Skipped { reason } => {
                    if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
                        if let Err(e) = repo.mark_skipped(id, &reason).await {
                            warn!(step = name, error = %e, "failed to persist skipped pipeline run");
                        }
                    }
                    self.callbacks.on_skip(name, &reason).await;
                    return StepOutcome::Skipped { reason };
                }
                StepResult::Failure { error } => {
                    if attempt >= self.options.max_retries {
                        step.cleanup(ctx, data).await;
                        let message = error.to_string();
                        if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
                            if let Err(e) = repo.mark_failed(id, &message).await {
                                warn!(step = name, error = %e, "failed to persist failed pipeline run");
                            }
                        }
                        self.callbacks.on_error(name, &error).await;
                        error!(step = name, session_id = %ctx.session_id, channel = ctx.channel_number, error = %error, "step failed terminally");
                        return StepOutcome::Failed { message };
                    }

                    attempt += 1;
                    let delay_ms = (self.options.retry_delay_ms as f64
                        * self.options.retry_backoff_multiplier.powi(attempt as i32 - 1))
                        as u64;
                    warn!(step = name, attempt, delay_ms, error = %error, "step failed, retrying");
                    if let (Some(repo), Some(id)) = (&self.pipeline_runs, run_id) {
                        if let Err(e) = repo.mark_retry(id).await {
                            warn!(step = name, error = %e, "failed to persist retry");
                        }
                        if let Err(e) = repo.mark_running(id).await {
                            warn!(step = name, error = %e, "failed to mark pipeline run running after retry");
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyStep {
        fail_times: u32,
        attempts: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Step for FlakyStep {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn should_run(&self, _ctx: &StepContext, _data: &PipelineData) -> bool {
            true
        }

        async fn execute(&self, _ctx: &StepContext, _data: &PipelineData) -> StepResult {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.fail_times {
                StepResult::failure(PipelineError::tool_failure("flaky", "transient failure"))
            } else {
                StepResult::success(PipelineData::default())
            }
        }
    }

    struct AlwaysFailStep;

    #[async_trait::async_trait]
    impl Step for AlwaysFailStep {
        fn name(&self) -> &'static str {
            "always-fail"
        }

        async fn should_run(&self, _ctx: &StepContext, _data: &PipelineData) -> bool {
            true
        }

        async fn execute(&self, _ctx: &StepContext, _data: &PipelineData) -> StepResult {
            StepResult::failure(PipelineError::tool_failure("always-fail", "permanent failure"))
        }
    }

    fn test_ctx() -> StepContext {
        StepContext {
            session_id: "sess1".to_string(),
            channel_number: 1,
            work_dir: std::path::PathBuf::from("/tmp/work"),
            output_dir: std::path::PathBuf::from("/tmp/output"),
            channel_group: "ch01-06".to_string(),
        }
    }

    fn fast_options(max_retries: u32) -> RunnerOptions {
        RunnerOptions {
            max_retries,
            retry_delay_ms: 0,
            retry_backoff_multiplier: 1.0,
            track_in_db: false,
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let step: Arc<dyn Step> = Arc::new(FlakyStep {
            fail_times: 2,
            attempts: AtomicU32::new(0),
        });
        let runner = PipelineRunner::new(vec![step], fast_options(3), None);
        let report = runner.run(&test_ctx(), PipelineData::default()).await;
        assert!(report.success);
        assert!(report.failed_steps.is_empty());
    }

    #[tokio::test]
    async fn exhausts_retries_and_fails_terminally() {
        let step: Arc<dyn Step> = Arc::new(AlwaysFailStep);
        let runner = PipelineRunner::new(vec![step], fast_options(2), None);
        let report = runner.run(&test_ctx(), PipelineData::default()).await;
        assert!(!report.success);
        assert_eq!(report.failed_steps, vec!["always-fail".to_string()]);
    }

    #[tokio::test]
    async fn failure_stops_subsequent_steps() {
        let failing: Arc<dyn Step> = Arc::new(AlwaysFailStep);
        let flaky: Arc<dyn Step> = Arc::new(FlakyStep {
            fail_times: 0,
            attempts: AtomicU32::new(0),
        });
        let runner = PipelineRunner::new(vec![failing, flaky], fast_options(0), None);
        let report = runner.run(&test_ctx(), PipelineData::default()).await;
        assert!(!report.success);
        assert_eq!(report.per_step.len(), 1);
    }
}
