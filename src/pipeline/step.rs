//! The Step contract the Pipeline Runner drives (§4.4).

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;

/// Addressing and working directories for a single Step invocation.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub session_id: String,
    pub channel_number: i32,
    /// Scratch directory for this channel's intermediates; purged at the end
    /// of session processing.
    pub work_dir: PathBuf,
    /// Where final per-channel artifacts (mp3, peaks, hls) are written
    /// before upload.
    pub output_dir: PathBuf,
    /// This channel's group name (e.g. `ch01-06`), resolved once by the
    /// Channel Processor via the Channel-Group Algebra (§4.7) so individual
    /// steps never recompute it.
    pub channel_group: String,
}

impl StepContext {
    pub fn work_path(&self, file_name: &str) -> PathBuf {
        self.work_dir.join(file_name)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Metrics a step may attach to its success result for observability; kept
/// loose (string keys) since each step's metrics differ in shape.
pub type StepMetrics = serde_json::Value;

/// Outcome of a single `execute` call.
pub enum StepResult {
    Success {
        data_delta: PipelineData,
        metrics: Option<StepMetrics>,
    },
    Skipped {
        reason: String,
    },
    Failure {
        error: PipelineError,
    },
}

impl StepResult {
    pub fn success(data_delta: PipelineData) -> Self {
        Self::Success {
            data_delta,
            metrics: None,
        }
    }

    pub fn success_with_metrics(data_delta: PipelineData, metrics: StepMetrics) -> Self {
        Self::Success {
            data_delta,
            metrics: Some(metrics),
        }
    }

    pub fn skipped<S: Into<String>>(reason: S) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failure(error: PipelineError) -> Self {
        Self::Failure { error }
    }
}

/// A single named unit of per-channel work. Implementations must be
/// idempotent with respect to pre-existing outputs on disk: the canonical
/// `should_run` check is "output already exists and is non-empty -> skip".
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identifier, persisted as `pipeline_runs.step_name`.
    fn name(&self) -> &'static str;

    async fn should_run(&self, ctx: &StepContext, data: &PipelineData) -> bool;

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult;

    /// Best-effort cleanup invoked only on terminal (retries-exhausted)
    /// failure. Exceptions are swallowed by the Runner with a warning.
    async fn cleanup(&self, _ctx: &StepContext, _data: &PipelineData) {}
}
