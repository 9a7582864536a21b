//! Step 6: `encode-mp3` (§4.5).

use async_trait::async_trait;

use crate::audio_toolbox::Mp3EncodeOptions;
use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct EncodeMp3Step {
    deps: StepDeps,
}

impl EncodeMp3Step {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for EncodeMp3Step {
    fn name(&self) -> &'static str {
        "encode-mp3"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.mp3_path.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let Some(input) = data.working_audio_path() else {
            return StepResult::failure(PipelineError::invariant_breach(
                "encode-mp3 requires a concatenated or normalized source file",
            ));
        };

        let is_quiet = data.is_quiet.unwrap_or(false);
        let vbr_quality = if is_quiet {
            self.deps.config.mp3.vbr_quality_quiet
        } else {
            self.deps.config.mp3.vbr_quality_normal
        };

        let output = ctx.output_path("channel.mp3");
        let options = Mp3EncodeOptions {
            use_vbr: true,
            vbr_quality,
            bitrate_kbps: self.deps.config.mp3.bitrate_kbps,
            filters: None,
        };
        if let Err(e) = self.deps.toolbox.encode_mp3(input, &output, &options).await {
            return StepResult::failure(e);
        }

        let duration_seconds = match self.deps.toolbox.duration(&output).await {
            Ok(d) => d,
            Err(e) => return StepResult::failure(e),
        };
        let file_size = match tokio::fs::metadata(&output).await {
            Ok(meta) => meta.len(),
            Err(e) => return StepResult::failure(PipelineError::tool_failure("encode-mp3", e.to_string())),
        };

        StepResult::success(PipelineData {
            mp3_path: Some(output),
            duration_seconds: Some(duration_seconds),
            mp3_file_size: Some(file_size),
            ..Default::default()
        })
    }
}
