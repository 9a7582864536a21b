//! Step 4: `analyze-audio` (§4.5).

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct AnalyzeAudioStep {
    deps: StepDeps,
}

impl AnalyzeAudioStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for AnalyzeAudioStep {
    fn name(&self) -> &'static str {
        "analyze-audio"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.analysis.is_none()
    }

    async fn execute(&self, _ctx: &StepContext, data: &PipelineData) -> StepResult {
        let Some(input) = data.concatenated_path.as_ref() else {
            return StepResult::failure(PipelineError::invariant_breach(
                "analyze-audio requires a concatenated file",
            ));
        };

        let analysis = match self
            .deps
            .toolbox
            .analyze(input, self.deps.config.loudness.quiet_threshold_db)
            .await
        {
            Ok(result) => result,
            Err(e) => return StepResult::failure(e),
        };

        let is_silent = analysis.mean_volume_db < self.deps.config.loudness.silence_threshold_db;

        StepResult::success(PipelineData {
            is_quiet: Some(analysis.is_quiet),
            is_silent: Some(is_silent),
            analysis: Some(analysis),
            ..Default::default()
        })
    }
}
