//! Step 2: `extract-channel` (§4.5).

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct ExtractChannelStep {
    deps: StepDeps,
}

impl ExtractChannelStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for ExtractChannelStep {
    fn name(&self) -> &'static str {
        "extract-channel"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.mono_paths.is_empty()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let mut mono_paths = Vec::with_capacity(data.source_segments.len());
        for segment in &data.source_segments {
            let output = ctx.work_path(&format!("mono_seg{:05}.flac", segment.segment_number));
            if let Err(e) = self
                .deps
                .toolbox
                .extract(&segment.local_path, segment.channel_index_in_group, &output)
                .await
            {
                return StepResult::failure(e);
            }
            mono_paths.push(output);
        }

        if mono_paths.is_empty() {
            return StepResult::failure(PipelineError::invariant_breach(
                "extract-channel produced no mono intermediates",
            ));
        }

        StepResult::success(PipelineData {
            mono_paths,
            ..Default::default()
        })
    }
}
