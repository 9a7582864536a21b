//! Regeneration HTTP: `/session/regenerate`, `/session/regenerate-mp3`,
//! `/session/regenerate-mp3-channel`, `/session/regenerate-peaks-channel`
//! (§6). Each invokes the Channel Processor directly; none of these
//! participate in the session status state machine (§5 "a regeneration run
//! inserts new PipelineRun rows rather than mutating historical ones").

use axum::{extract::State, response::Response, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::pipeline::runner::RunReport;
use crate::web::responses::{bad_request, handle_error, ok};
use crate::web::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub session_id: String,
    pub channel_number: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelRegenerateResult {
    channel_number: i32,
    success: bool,
    failed_steps: Vec<String>,
}

impl ChannelRegenerateResult {
    fn from_report(channel_number: i32, report: RunReport) -> Self {
        Self {
            channel_number,
            success: report.success,
            failed_steps: report.failed_steps,
        }
    }
}

async fn target_channels(state: &AppState, session_id: &str, channel_number: Option<i32>) -> Result<(Vec<i32>, u32), Response> {
    let session = match state.sessions.find_by_id(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(handle_error(AppError::not_found("session", session_id))),
        Err(e) => return Err(handle_error(e.into())),
    };
    let total_channels = session.channels as u32;
    match channel_number {
        Some(n) if n < 1 || n as u32 > total_channels => {
            Err(bad_request(format!("channel {n} is out of range for a {total_channels}-channel session")))
        }
        Some(n) => Ok((vec![n], total_channels)),
        None => Ok(((1..=session.channels).collect(), total_channels)),
    }
}

/// `/session/regenerate`: a full channel rerun (every Default Channel
/// Pipeline step, reconstituted from source segments).
#[utoipa::path(post, path = "/session/regenerate", responses((status = 200), (status = 400), (status = 404)), tag = "regenerate")]
pub async fn regenerate_session(State(state): State<AppState>, Json(req): Json<RegenerateRequest>) -> Response {
    let (channels, total_channels) = match target_channels(&state, &req.session_id, req.channel_number).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut results = Vec::with_capacity(channels.len());
    for channel_number in channels {
        let report = state.channel_processor.process(&req.session_id, channel_number, total_channels).await;
        results.push(ChannelRegenerateResult::from_report(channel_number, report));
    }
    info!(session_id = %req.session_id, channels = results.len(), "session regeneration complete");
    ok(results)
}

/// `/session/regenerate-mp3`: mp3-only rerun across every channel of the
/// session.
#[utoipa::path(post, path = "/session/regenerate-mp3", responses((status = 200), (status = 400), (status = 404)), tag = "regenerate")]
pub async fn regenerate_mp3(State(state): State<AppState>, Json(req): Json<RegenerateRequest>) -> Response {
    let (channels, total_channels) = match target_channels(&state, &req.session_id, req.channel_number).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut results = Vec::with_capacity(channels.len());
    for channel_number in channels {
        let report = state.channel_processor.regenerate_mp3(&req.session_id, channel_number, total_channels).await;
        results.push(ChannelRegenerateResult::from_report(channel_number, report));
    }
    ok(results)
}

/// `/session/regenerate-mp3-channel`: mp3-only rerun for one channel;
/// `channelNumber` is required.
#[utoipa::path(post, path = "/session/regenerate-mp3-channel", responses((status = 200), (status = 400), (status = 404)), tag = "regenerate")]
pub async fn regenerate_mp3_channel(State(state): State<AppState>, Json(req): Json<RegenerateRequest>) -> Response {
    let Some(channel_number) = req.channel_number else {
        return bad_request("channelNumber is required");
    };
    let (_, total_channels) = match target_channels(&state, &req.session_id, Some(channel_number)).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report = state.channel_processor.regenerate_mp3(&req.session_id, channel_number, total_channels).await;
    ok(ChannelRegenerateResult::from_report(channel_number, report))
}

/// `/session/regenerate-peaks-channel`: peaks+HLS rerun for one channel;
/// `channelNumber` is required.
#[utoipa::path(post, path = "/session/regenerate-peaks-channel", responses((status = 200), (status = 400), (status = 404)), tag = "regenerate")]
pub async fn regenerate_peaks_channel(State(state): State<AppState>, Json(req): Json<RegenerateRequest>) -> Response {
    let Some(channel_number) = req.channel_number else {
        return bad_request("channelNumber is required");
    };
    let (_, total_channels) = match target_channels(&state, &req.session_id, Some(channel_number)).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report = state.channel_processor.regenerate_peaks_hls(&req.session_id, channel_number, total_channels).await;
    ok(ChannelRegenerateResult::from_report(channel_number, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::data::PipelineData;

    #[test]
    fn from_report_carries_channel_and_failure_list() {
        let report = RunReport {
            success: false,
            final_data: PipelineData::default(),
            per_step: vec![],
            total_duration_ms: 42,
            failed_steps: vec!["encode_mp3".to_string()],
            skipped_steps: vec![],
        };

        let result = ChannelRegenerateResult::from_report(7, report);

        assert_eq!(result.channel_number, 7);
        assert!(!result.success);
        assert_eq!(result.failed_steps, vec!["encode_mp3".to_string()]);
    }
}
