//! Step 3: `concatenate` (§4.5).

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct ConcatenateStep {
    deps: StepDeps,
}

impl ConcatenateStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for ConcatenateStep {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.concatenated_path.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        if data.mono_paths.is_empty() {
            return StepResult::failure(PipelineError::invariant_breach(
                "concatenate has no mono intermediates to join",
            ));
        }

        let list_path = ctx.work_path("concat_list.txt");
        let list_contents = data
            .mono_paths
            .iter()
            .map(|p| format!("file '{}'", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(e) = tokio::fs::write(&list_path, list_contents).await {
            return StepResult::failure(PipelineError::tool_failure("concatenate", e.to_string()));
        }

        let output = ctx.work_path("concatenated.flac");
        if let Err(e) = self.deps.toolbox.concatenate(&list_path, &output, "flac").await {
            return StepResult::failure(e);
        }

        StepResult::success(PipelineData {
            concatenated_path: Some(output),
            ..Default::default()
        })
    }
}
