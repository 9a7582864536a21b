//! Shared test doubles for individual Step unit tests.

#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseBackend, MockDatabase};

use crate::audio_toolbox::{AnalyzeResult, AudioToolbox, LoudnessNormalizeResult, Mp3EncodeOptions, PeaksData};
use crate::config::{ObjectStoreConfig, PipelineConfig};
use crate::database::repositories::{ChannelSettingRepository, SegmentRepository};
use crate::errors::PipelineError;
use crate::pipeline::steps::StepDeps;

pub struct UnreachableToolbox;

#[async_trait]
impl AudioToolbox for UnreachableToolbox {
    async fn extract(&self, _: &Path, _: u32, _: &Path) -> Result<(), PipelineError> {
        unreachable!()
    }
    async fn concatenate(&self, _: &Path, _: &Path, _: &str) -> Result<(), PipelineError> {
        unreachable!()
    }
    async fn analyze(&self, _: &Path, _: f64) -> Result<AnalyzeResult, PipelineError> {
        unreachable!()
    }
    async fn loudness_normalize(&self, _: &Path, _: &Path, _: f64, _: f64, _: f64, _: f64, _: f64, _: f64) -> Result<LoudnessNormalizeResult, PipelineError> {
        unreachable!()
    }
    async fn gain_normalize(&self, _: &Path, _: &Path, _: f64, _: f64) -> Result<(), PipelineError> {
        unreachable!()
    }
    async fn encode_mp3(&self, _: &Path, _: &Path, _: &Mp3EncodeOptions) -> Result<(), PipelineError> {
        unreachable!()
    }
    async fn peaks(&self, _: &Path, _: &Path, _: u32, _: u32) -> Result<PeaksData, PipelineError> {
        unreachable!()
    }
    async fn hls(&self, _: &Path, _: &Path, _: &str, _: u32, _: u32) -> Result<(), PipelineError> {
        unreachable!()
    }
    async fn duration(&self, _: &Path) -> Result<f64, PipelineError> {
        unreachable!()
    }
}

/// `StepDeps` wired to a toolbox that panics on use, for steps whose test
/// cases never reach a toolbox call (gating checks, early returns).
pub async fn unreachable_toolbox_deps() -> (StepDeps, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let blobs = sandboxed_file_manager::SandboxedManager::builder()
        .base_directory(dir.path())
        .build()
        .await
        .unwrap();
    let db = || Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
    let deps = StepDeps {
        toolbox: Arc::new(UnreachableToolbox),
        blobs,
        object_store: None,
        object_store_config: ObjectStoreConfig::default(),
        segments: Arc::new(SegmentRepository::new(db())),
        channel_settings: Arc::new(ChannelSettingRepository::new(db())),
        config: PipelineConfig::default(),
    };
    (deps, dir)
}
