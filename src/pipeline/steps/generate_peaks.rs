//! Step 7: `generate-peaks` (§4.5).

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

#[derive(Serialize)]
struct NormalizedPeaks {
    length: usize,
    sample_rate: u32,
    data: Vec<f64>,
}

pub struct GeneratePeaksStep {
    deps: StepDeps,
}

impl GeneratePeaksStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for GeneratePeaksStep {
    fn name(&self) -> &'static str {
        "generate-peaks"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.peaks_path.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        if data.is_silent == Some(true) {
            return StepResult::skipped("channel is silent");
        }
        let Some(input) = data.working_audio_path() else {
            return StepResult::failure(PipelineError::invariant_breach(
                "generate-peaks requires a concatenated or normalized source file",
            ));
        };

        let output = ctx.output_path("peaks.json");
        let raw = match self
            .deps
            .toolbox
            .peaks(input, &output, self.deps.config.peaks.pixels_per_second, self.deps.config.peaks.bits)
            .await
        {
            Ok(peaks) => peaks,
            Err(e) => return StepResult::failure(e),
        };

        let max_abs = raw.data.iter().map(|v| v.unsigned_abs()).max().unwrap_or(0);
        let normalized_data: Vec<f64> = if max_abs == 0 {
            warn!(session_id = %ctx.session_id, channel = ctx.channel_number, "peaks samples are all zero, keeping unnormalized file");
            raw.data.iter().map(|v| *v as f64).collect()
        } else {
            raw.data
                .iter()
                .map(|v| (*v as f64 / max_abs as f64 * 100.0).round() / 100.0)
                .collect()
        };

        let normalized = NormalizedPeaks {
            length: raw.length,
            sample_rate: raw.sample_rate,
            data: normalized_data,
        };
        let json = match serde_json::to_vec(&normalized) {
            Ok(bytes) => bytes,
            Err(e) => return StepResult::failure(PipelineError::tool_failure("generate-peaks", e.to_string())),
        };
        if let Err(e) = tokio::fs::write(&output, json).await {
            return StepResult::failure(PipelineError::tool_failure("generate-peaks", e.to_string()));
        }

        StepResult::success(PipelineData {
            peaks_path: Some(output),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::steps::tests_support::unreachable_toolbox_deps;
    use std::path::PathBuf;

    fn ctx() -> StepContext {
        StepContext {
            session_id: "sess1".into(),
            channel_number: 1,
            work_dir: PathBuf::from("/tmp/work"),
            output_dir: PathBuf::from("/tmp/output"),
            channel_group: "ch01-06".into(),
        }
    }

    #[tokio::test]
    async fn should_run_is_false_once_peaks_path_is_set() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GeneratePeaksStep::new(deps);
        let mut data = PipelineData::default();
        assert!(step.should_run(&ctx(), &data).await);
        data.peaks_path = Some(PathBuf::from("/a/peaks.json"));
        assert!(!step.should_run(&ctx(), &data).await);
    }

    #[tokio::test]
    async fn execute_skips_silent_channels() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GeneratePeaksStep::new(deps);
        let data = PipelineData {
            is_silent: Some(true),
            ..Default::default()
        };
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Skipped { .. }));
    }

    #[tokio::test]
    async fn execute_fails_without_a_source_file() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GeneratePeaksStep::new(deps);
        let data = PipelineData::default();
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Failure { .. }));
    }
}
