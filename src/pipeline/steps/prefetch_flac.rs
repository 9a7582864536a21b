//! Step 1: `prefetch-flac` (§4.5).

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::errors::PipelineError;
use crate::pipeline::data::{PipelineData, SourceSegment};
use crate::pipeline::step::{Step, StepContext, StepResult};
use crate::pipeline::steps::StepDeps;

pub struct PrefetchFlacStep {
    deps: StepDeps,
}

impl PrefetchFlacStep {
    pub fn new(deps: StepDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Step for PrefetchFlacStep {
    fn name(&self) -> &'static str {
        "prefetch-flac"
    }

    async fn should_run(&self, _ctx: &StepContext, data: &PipelineData) -> bool {
        data.source_segments.is_empty()
    }

    async fn execute(&self, ctx: &StepContext, _data: &PipelineData) -> StepResult {
        let rows = match self
            .deps
            .segments
            .find_by_session_and_group(&ctx.session_id, &ctx.channel_group)
            .await
        {
            Ok(rows) => rows,
            Err(e) => return StepResult::failure(PipelineError::invariant_breach(e.to_string())),
        };

        if rows.is_empty() {
            return StepResult::failure(PipelineError::invariant_breach(format!(
                "no segments found for session {} group {}",
                ctx.session_id, ctx.channel_group
            )));
        }

        let within_group_index = match crate::pipeline::channel_group::parse_group_name(&ctx.channel_group)
            .and_then(|g| g.within_group_index(ctx.channel_number as u32))
        {
            Some(idx) => idx,
            None => {
                return StepResult::failure(PipelineError::invariant_breach(format!(
                    "channel {} does not belong to group {}",
                    ctx.channel_number, ctx.channel_group
                )))
            }
        };

        let concurrency = self.deps.object_store_config.prefetch_concurrency.max(1);
        let resolved: Vec<Result<(usize, PathBuf), PipelineError>> = stream::iter(rows.iter().enumerate())
            .map(|(index, row)| {
                let deps = self.deps.clone();
                async move { resolve_segment(&deps, row).await.map(|path| (index, path)) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut ordered: Vec<Option<PathBuf>> = vec![None; rows.len()];
        for result in resolved {
            match result {
                Ok((index, path)) => ordered[index] = Some(path),
                Err(e) => return StepResult::failure(e),
            }
        }

        let source_segments = rows
            .iter()
            .zip(ordered)
            .map(|(row, path)| SourceSegment {
                segment_number: row.segment_number,
                channel_index_in_group: within_group_index,
                local_path: path.expect("every row resolved or the step already failed"),
            })
            .collect();

        StepResult::success(PipelineData {
            source_segments,
            ..Default::default()
        })
    }
}

async fn resolve_segment(
    deps: &StepDeps,
    row: &crate::database::entities::segments::Model,
) -> Result<PathBuf, PipelineError> {
    if deps.blobs.exists(&row.local_path).await.unwrap_or(false) {
        return deps
            .blobs
            .get_full_path(&row.local_path)
            .map_err(|e| PipelineError::invariant_breach(e.to_string()));
    }

    let (store, key) = match (&deps.object_store, &row.s3_key) {
        (Some(store), Some(key)) => (store, key),
        _ => {
            return Err(PipelineError::invariant_breach(format!(
                "segment {} missing locally and not uploaded",
                row.id
            )))
        }
    };

    let bytes = store
        .get_bytes(key)
        .await
        .map_err(|e| PipelineError::tool_failure("prefetch-flac", e.to_string()))?;
    deps.blobs
        .write(&row.local_path, bytes)
        .await
        .map_err(|e| PipelineError::tool_failure("prefetch-flac", e.to_string()))?;
    deps.blobs
        .get_full_path(&row.local_path)
        .map_err(|e| PipelineError::invariant_breach(e.to_string()))
}
