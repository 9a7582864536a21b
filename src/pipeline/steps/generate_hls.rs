//! Step 8: `generate-hls` (§4.5).

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct GenerateHlsStep {
    deps: StepDeps,
}

impl GenerateHlsStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for GenerateHlsStep {
    fn name(&self) -> &'static str {
        "generate-hls"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.hls_playlist_path.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        if data.is_silent == Some(true) {
            return StepResult::skipped("channel is silent");
        }
        let Some(input) = data.mp3_path.as_ref() else {
            return StepResult::failure(PipelineError::invariant_breach(
                "generate-hls requires the encoded mp3 rendition",
            ));
        };

        let playlist_path = ctx.output_path("channel.m3u8");
        let segment_pattern = ctx.output_path("channel_%05d.ts");

        if let Err(e) = self
            .deps
            .toolbox
            .hls(
                input,
                &playlist_path,
                &segment_pattern.to_string_lossy(),
                self.deps.config.hls.segment_duration_secs,
                self.deps.config.hls.audio_bitrate_kbps,
            )
            .await
        {
            return StepResult::failure(e);
        }

        let segment_paths = match collect_segment_paths(&playlist_path).await {
            Ok(paths) => paths,
            Err(e) => return StepResult::failure(e),
        };

        StepResult::success(PipelineData {
            hls_playlist_path: Some(playlist_path),
            hls_segment_paths: segment_paths,
            ..Default::default()
        })
    }
}

async fn collect_segment_paths(playlist_path: &std::path::Path) -> Result<Vec<std::path::PathBuf>, PipelineError> {
    let contents = tokio::fs::read_to_string(playlist_path)
        .await
        .map_err(|e| PipelineError::tool_failure("generate-hls", e.to_string()))?;
    let dir = playlist_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    Ok(contents
        .lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
        .map(|l| dir.join(l.trim()))
        .collect())
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
    async fn should_run_is_false_once_playlist_is_set() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GenerateHlsStep::new(deps);
        let mut data = PipelineData::default();
        assert!(step.should_run(&ctx(), &data).await);
        data.hls_playlist_path = Some(PathBuf::from("/a/channel.m3u8"));
        assert!(!step.should_run(&ctx(), &data).await);
    }

    #[tokio::test]
    async fn execute_skips_silent_channels() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GenerateHlsStep::new(deps);
        let data = PipelineData {
            is_silent: Some(true),
            ..Default::default()
        };
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Skipped { .. }));
    }

    #[tokio::test]
    async fn execute_fails_without_an_encoded_mp3() {
        let (deps, _dir) = unreachable_toolbox_deps().await;
        let step = GenerateHlsStep::new(deps);
        // No `mp3_path` set, only a normalized working file — HLS must come
        // from the encoded mp3, not the lossless rendition.
        let data = PipelineData {
            normalized_path: Some(PathBuf::from("/a/norm.flac")),
            ..Default::default()
        };
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Failure { .. }));
    }
}
