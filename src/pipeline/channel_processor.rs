//! Channel Processor: runs the Default Channel Pipeline for one
//! `(session_id, channel_number)` target and persists the outcome (§4.5,
//! final paragraph).

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Config, PipelineConfig};
use crate::database::repositories::{ChannelOutcome, PipelineRunRepository, ProcessedChannelRepository};
use crate::pipeline::channel_group::group_for_channel;
use crate::pipeline::data::PipelineData;
use crate::pipeline::runner::{PipelineRunner, RunReport, RunnerOptions};
use crate::pipeline::step::{Step, StepContext};
use crate::pipeline::steps::{default_channel_pipeline, mp3_only_pipeline, peaks_hls_only_pipeline, StepDeps};

pub struct ChannelProcessor {
    deps: StepDeps,
    pipeline_runs: Arc<PipelineRunRepository>,
    processed_channels: Arc<ProcessedChannelRepository>,
    pipeline_config: PipelineConfig,
    work_root: PathBuf,
}

impl ChannelProcessor {
    pub fn new(
        deps: StepDeps,
        pipeline_runs: Arc<PipelineRunRepository>,
        processed_channels: Arc<ProcessedChannelRepository>,
        config: &Config,
    ) -> Self {
        Self {
            pipeline_config: deps.config.clone(),
            deps,
            pipeline_runs,
            processed_channels,
            work_root: config.storage.blob_root.join(".temp"),
        }
    }

    /// Runs the Default Channel Pipeline for `channel_number` within
    /// `session_id`'s channel count, then writes/overwrites the
    /// `ProcessedChannel` row. Returns the run report so callers (the
    /// Session Processor) can decide overall session success.
    pub async fn process(&self, session_id: &str, channel_number: i32, total_channels: u32) -> RunReport {
        self.process_with(
            session_id,
            channel_number,
            total_channels,
            default_channel_pipeline(self.deps.clone()),
            PipelineData::default(),
            true,
        )
        .await
    }

    /// Reruns only the mp3 master (`/session/regenerate-mp3*`, §6 Regeneration HTTP).
    pub async fn regenerate_mp3(&self, session_id: &str, channel_number: i32, total_channels: u32) -> RunReport {
        self.process_with(
            session_id,
            channel_number,
            total_channels,
            mp3_only_pipeline(self.deps.clone()),
            PipelineData::default(),
            true,
        )
        .await
    }

    /// Reruns only peaks and HLS (`/session/regenerate-peaks-channel`, §6 Regeneration HTTP).
    pub async fn regenerate_peaks_hls(&self, session_id: &str, channel_number: i32, total_channels: u32) -> RunReport {
        self.process_with(
            session_id,
            channel_number,
            total_channels,
            peaks_hls_only_pipeline(self.deps.clone()),
            PipelineData::default(),
            true,
        )
        .await
    }

    /// Replays a single named step, starting from its own persisted input
    /// snapshot rather than from scratch (Admin "retry", §6 Admin HTTP
    /// `/api/admin/pipeline-runs/{runId}/retry`). Returns `None` if no step
    /// in the Default Channel Pipeline has that name.
    pub async fn retry_step(
        &self,
        session_id: &str,
        channel_number: i32,
        total_channels: u32,
        step_name: &str,
        input_snapshot: &str,
    ) -> Option<RunReport> {
        let step = default_channel_pipeline(self.deps.clone())
            .into_iter()
            .find(|s| s.name() == step_name)?;
        let data: PipelineData = serde_json::from_str(input_snapshot).unwrap_or_default();
        Some(self.process_with(session_id, channel_number, total_channels, vec![step], data, false).await)
    }

    async fn process_with(
        &self,
        session_id: &str,
        channel_number: i32,
        total_channels: u32,
        steps: Vec<Arc<dyn Step>>,
        initial_data: PipelineData,
        persist_outcome: bool,
    ) -> RunReport {
        let channel_group = group_for_channel(channel_number as u32, total_channels, self.pipeline_config.group_size)
            .map(|g| g.name())
            .unwrap_or_else(|| "unknown".to_string());

        let channel_dir = self
            .work_root
            .join(session_id)
            .join(format!("channel_{channel_number:02}"));
        let work_dir = channel_dir.join("work");
        let output_dir = channel_dir.join("output");
        if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
            warn!(session_id, channel_number, error = %e, "failed to create channel work directory");
        }
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            warn!(session_id, channel_number, error = %e, "failed to create channel output directory");
        }

        let ctx = StepContext {
            session_id: session_id.to_string(),
            channel_number,
            work_dir,
            output_dir,
            channel_group,
        };

        let options = RunnerOptions::from_config(&self.pipeline_config, true);
        let runner = PipelineRunner::new(steps, options, Some(self.pipeline_runs.clone()));

        let report = runner.run(&ctx, initial_data).await;

        if report.success && persist_outcome {
            let data = &report.final_data;
            let outcome = ChannelOutcome {
                local_path: data
                    .mp3_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
                s3_key: data.mp3_s3_key.clone(),
                s3_url: data.mp3_s3_url.clone(),
                hls_url: data.hls_s3_url.clone(),
                peaks_url: data.peaks_s3_url.clone(),
                file_size: data.mp3_file_size.unwrap_or(0) as i64,
                duration_seconds: data.duration_seconds,
                is_quiet: data.is_quiet.unwrap_or(false),
                is_silent: data.is_silent.unwrap_or(false),
            };
            if let Err(e) = self.processed_channels.upsert(session_id, channel_number, outcome).await {
                warn!(session_id, channel_number, error = %e, "failed to persist processed channel outcome");
            } else {
                info!(session_id, channel_number, "channel processed");
            }
        } else if !report.success {
            warn!(session_id, channel_number, failed_steps = ?report.failed_steps, "channel processing failed");
        }

        report
    }
}
