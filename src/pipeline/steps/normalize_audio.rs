//! Step 5: `normalize-audio` (§4.5).

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

const TARGET_LUFS_SETTING: &str = "target_lufs";

pub struct NormalizeAudioStep {
    deps: StepDeps,
}

impl NormalizeAudioStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for NormalizeAudioStep {
    fn name(&self) -> &'static str {
        "normalize-audio"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.normalized_path.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let loudness = &self.deps.config.loudness;

        if !loudness.normalize_enabled {
            return StepResult::skipped("normalization disabled in configuration");
        }
        if data.is_quiet == Some(true) {
            return StepResult::skipped("channel is quiet");
        }

        let Some(analysis) = &data.analysis else {
            return StepResult::failure(PipelineError::invariant_breach(
                "normalize-audio requires analyze-audio to have run",
            ));
        };
        let Some(input) = data.concatenated_path.as_ref() else {
            return StepResult::failure(PipelineError::invariant_breach(
                "normalize-audio requires a concatenated file",
            ));
        };

        let target_lufs = match self
            .deps
            .channel_settings
            .get(&ctx.session_id, ctx.channel_number, TARGET_LUFS_SETTING)
            .await
        {
            Ok(Some(row)) => row.value.parse().unwrap_or(loudness.target_lufs),
            Ok(None) => loudness.target_lufs,
            Err(e) => return StepResult::failure(PipelineError::invariant_breach(e.to_string())),
        };

        let required_gain = target_lufs - analysis.integrated_loudness_lufs;
        if required_gain.abs() < loudness.min_gain_lu {
            return StepResult::skipped(format!(
                "required gain {required_gain:.2} LU below minimum {:.2}",
                loudness.min_gain_lu
            ));
        }

        let output = ctx.work_path("normalized.flac");

        let result = if required_gain.abs() > loudness.high_gain_threshold_db {
            self.deps
                .toolbox
                .gain_normalize(input, &output, required_gain, loudness.target_true_peak_db)
                .await
                .map(|_| ())
        } else {
            self.deps
                .toolbox
                .loudness_normalize(
                    input,
                    &output,
                    target_lufs,
                    loudness.target_true_peak_db,
                    loudness.target_lra,
                    analysis.integrated_loudness_lufs,
                    analysis.true_peak_dbtp,
                    analysis.loudness_range_lu,
                )
                .await
                .map(|_| ())
        };

        if let Err(e) = result {
            return StepResult::failure(e);
        }

        StepResult::success(PipelineData {
            normalized_path: Some(output),
            is_silent: Some(false),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_toolbox::AnalyzeResult;
    use crate::config::{ObjectStoreConfig, PipelineConfig};
    use crate::database::repositories::{ChannelSettingRepository, SegmentRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    struct UnreachableToolbox;

    #[async_trait]
    impl crate::audio_toolbox::AudioToolbox for UnreachableToolbox {
        async fn extract(&self, _: &std::path::Path, _: u32, _: &std::path::Path) -> Result<(), PipelineError> {
            unreachable!()
        }
        async fn concatenate(&self, _: &std::path::Path, _: &std::path::Path, _: &str) -> Result<(), PipelineError> {
            unreachable!()
        }
        async fn analyze(&self, _: &std::path::Path, _: f64) -> Result<AnalyzeResult, PipelineError> {
            unreachable!()
        }
        async fn loudness_normalize(
            &self,
            _: &std::path::Path,
            _: &std::path::Path,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> Result<crate::audio_toolbox::LoudnessNormalizeResult, PipelineError> {
            unreachable!()
        }
        async fn gain_normalize(&self, _: &std::path::Path, _: &std::path::Path, _: f64, _: f64) -> Result<(), PipelineError> {
            unreachable!()
        }
        async fn encode_mp3(&self, _: &std::path::Path, _: &std::path::Path, _: &crate::audio_toolbox::Mp3EncodeOptions) -> Result<(), PipelineError> {
            unreachable!()
        }
        async fn peaks(&self, _: &std::path::Path, _: &std::path::Path, _: u32, _: u32) -> Result<crate::audio_toolbox::PeaksData, PipelineError> {
            unreachable!()
        }
        async fn hls(&self, _: &std::path::Path, _: &std::path::Path, _: &str, _: u32, _: u32) -> Result<(), PipelineError> {
            unreachable!()
        }
        async fn duration(&self, _: &std::path::Path) -> Result<f64, PipelineError> {
            unreachable!()
        }
    }

    async fn step_with_config(config: PipelineConfig) -> (NormalizeAudioStep, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = sandboxed_file_manager::SandboxedManager::builder()
            .base_directory(dir.path())
            .build()
            .await
            .unwrap();
        let db = || Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let step = NormalizeAudioStep::new(StepDeps {
            toolbox: Arc::new(UnreachableToolbox),
            blobs,
            object_store: None,
            object_store_config: ObjectStoreConfig::default(),
            segments: Arc::new(SegmentRepository::new(db())),
            channel_settings: Arc::new(ChannelSettingRepository::new(db())),
            config,
        });
        (step, dir)
    }

    fn ctx() -> StepContext {
        StepContext {
            session_id: "sess1".into(),
            channel_number: 1,
            work_dir: std::path::PathBuf::from("/tmp/work"),
            output_dir: std::path::PathBuf::from("/tmp/output"),
            channel_group: "ch01-06".into(),
        }
    }

    #[tokio::test]
    async fn should_run_is_false_once_normalized_path_is_set() {
        let (step, _dir) = step_with_config(PipelineConfig::default()).await;
        let mut data = PipelineData::default();
        assert!(step.should_run(&ctx(), &data).await);
        data.normalized_path = Some(std::path::PathBuf::from("/a/norm.flac"));
        assert!(!step.should_run(&ctx(), &data).await);
    }

    #[tokio::test]
    async fn execute_skips_when_normalization_disabled() {
        let mut config = PipelineConfig::default();
        config.loudness.normalize_enabled = false;
        let (step, _dir) = step_with_config(config).await;
        let data = PipelineData {
            concatenated_path: Some(std::path::PathBuf::from("/a/concat.flac")),
            analysis: Some(AnalyzeResult {
                max_volume_db: -3.0,
                mean_volume_db: -20.0,
                integrated_loudness_lufs: -20.0,
                true_peak_dbtp: -2.0,
                loudness_range_lu: 5.0,
                is_quiet: false,
            }),
            ..Default::default()
        };
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Skipped { .. }));
    }

    #[tokio::test]
    async fn execute_skips_quiet_channels() {
        let (step, _dir) = step_with_config(PipelineConfig::default()).await;
        let data = PipelineData {
            is_quiet: Some(true),
            concatenated_path: Some(std::path::PathBuf::from("/a/concat.flac")),
            analysis: Some(AnalyzeResult {
                max_volume_db: -3.0,
                mean_volume_db: -20.0,
                integrated_loudness_lufs: -20.0,
                true_peak_dbtp: -2.0,
                loudness_range_lu: 5.0,
                is_quiet: true,
            }),
            ..Default::default()
        };
        let result = step.execute(&ctx(), &data).await;
        assert!(matches!(result, StepResult::Skipped { .. }));
    }
}
