//! Step 9: `upload-mp3`, `upload-peaks`, `upload-hls` (§4.5).

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::errors::PipelineError;
use crate::pipeline::data::PipelineData;
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;
use crate::storage::blob::ObjectKeyLayout;

fn key_layout(deps: &StepDeps) -> ObjectKeyLayout<'_> {
    ObjectKeyLayout::new(&deps.object_store_config)
}

pub struct UploadMp3Step {
    deps: StepDeps,
}

impl UploadMp3Step {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for UploadMp3Step {
    fn name(&self) -> &'static str {
        "upload-mp3"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        self.deps.object_store.is_some() && data.mp3_s3_url.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let Some(store) = self.deps.object_store.as_ref() else {
            return StepResult::skipped("no object store configured");
        };
        let Some(mp3_path) = data.mp3_path.as_ref() else {
            return StepResult::failure(PipelineError::invariant_breach("upload-mp3 requires encode-mp3 to have run"));
        };

        let key = key_layout(&self.deps).mp3_key(&ctx.session_id, ctx.channel_number);
        if let Err(e) = store.put_file(&key, mp3_path, "audio/mpeg").await {
            return StepResult::failure(PipelineError::tool_failure("upload-mp3", e.to_string()));
        }

        StepResult::success(PipelineData {
            mp3_s3_key: Some(key.clone()),
            mp3_s3_url: Some(store.public_url(&key)),
            ..Default::default()
        })
    }
}

pub struct UploadPeaksStep {
    deps: StepDeps,
}

impl UploadPeaksStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for UploadPeaksStep {
    fn name(&self) -> &'static str {
        "upload-peaks"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        self.deps.object_store.is_some() && data.peaks_s3_url.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let Some(store) = self.deps.object_store.as_ref() else {
            return StepResult::skipped("no object store configured");
        };
        let Some(peaks_path) = data.peaks_path.as_ref() else {
            return StepResult::skipped("no peaks file to upload");
        };

        let key = key_layout(&self.deps).peaks_key(&ctx.session_id, ctx.channel_number);
        if let Err(e) = store.put_file(&key, peaks_path, "application/json").await {
            return StepResult::failure(PipelineError::tool_failure("upload-peaks", e.to_string()));
        }

        StepResult::success(PipelineData {
            peaks_s3_key: Some(key.clone()),
            peaks_s3_url: Some(store.public_url(&key)),
            ..Default::default()
        })
    }
}

pub struct UploadHlsStep {
    deps: StepDeps,
}

impl UploadHlsStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for UploadHlsStep {
    fn name(&self) -> &'static str {
        "upload-hls"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        self.deps.object_store.is_some() && data.hls_s3_url.is_none()
    }

    async fn execute(&self, ctx: &StepContext, data: &PipelineData) -> StepResult {
        let Some(store) = self.deps.object_store.as_ref() else {
            return StepResult::skipped("no object store configured");
        };
        let Some(playlist_path) = data.hls_playlist_path.as_ref() else {
            return StepResult::skipped("no HLS playlist to upload");
        };

        let layout = key_layout(&self.deps);
        let concurrency = self.deps.object_store_config.hls_upload_concurrency.max(1);

        let segment_results: Vec<Result<(), PipelineError>> = stream::iter(data.hls_segment_paths.iter())
            .map(|segment_path| {
                let store = Arc::clone(store);
                let key = layout.hls_segment_key(
                    &ctx.session_id,
                    segment_path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
                );
                async move {
                    store
                        .put_file(&key, segment_path, "video/mp2t")
                        .await
                        .map_err(|e| PipelineError::tool_failure("upload-hls", e.to_string()))
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        if let Some(Err(e)) = segment_results.into_iter().find(|r| r.is_err()) {
            return StepResult::failure(e);
        }

        let playlist_key = layout.hls_playlist_key(&ctx.session_id, ctx.channel_number);
        if let Err(e) = store.put_file(&playlist_key, playlist_path, "application/vnd.apple.mpegurl").await {
            return StepResult::failure(PipelineError::tool_failure("upload-hls", e.to_string()));
        }

        StepResult::success(PipelineData {
            hls_s3_url: Some(store.public_url(&playlist_key)),
            ..Default::default()
        })
    }
}
