//! Admin HTTP surface (§6.1): pipeline-run visibility and replay, and CRUD
//! for annotations, channel settings, and recording metadata — none of
//! which participate in the Ingest/Session state machine.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::entities::pipeline_runs::PipelineRunStatus;
use crate::errors::AppError;
use crate::web::responses::{handle_error, ok};
use crate::web::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PipelineRunView {
    pub id: i32,
    pub session_id: String,
    pub channel_number: Option<i32>,
    pub step_name: String,
    pub status: PipelineRunStatus,
    pub retry_count: i32,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl From<crate::database::entities::pipeline_runs::Model> for PipelineRunView {
    fn from(m: crate::database::entities::pipeline_runs::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            channel_number: m.channel_number,
            step_name: m.step_name,
            status: m.status,
            retry_count: m.retry_count,
            duration_ms: m.duration_ms,
            error_message: m.error_message,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[utoipa::path(get, path = "/api/admin/sessions/{sessionId}/pipeline-runs", responses((status = 200, body = [PipelineRunView])), tag = "admin")]
pub async fn list_pipeline_runs(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.pipeline_runs.find_by_session(&session_id).await {
        Ok(runs) => ok(runs.into_iter().map(PipelineRunView::from).collect::<Vec<_>>()),
        Err(e) => handle_error(e.into()),
    }
}

/// Replays a single pipeline run by re-running only its step
/// (`pipeline_runs.step_name`) starting from its own persisted
/// `input_snapshot`, rather than rerunning the whole channel from scratch.
#[utoipa::path(post, path = "/api/admin/pipeline-runs/{runId}/retry", responses((status = 200), (status = 404)), tag = "admin")]
pub async fn retry_pipeline_run(State(state): State<AppState>, Path(run_id): Path<i32>) -> Response {
    let run = match state.pipeline_runs.find_by_id(run_id).await {
        Ok(Some(run)) => run,
        Ok(None) => return handle_error(AppError::not_found("pipeline_run", run_id.to_string())),
        Err(e) => return handle_error(e.into()),
    };
    let Some(channel_number) = run.channel_number else {
        return handle_error(AppError::validation("pipeline run has no associated channel to retry"));
    };
    let session = match state.sessions.find_by_id(&run.session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return handle_error(AppError::not_found("session", run.session_id)),
        Err(e) => return handle_error(e.into()),
    };

    let report = match state
        .channel_processor
        .retry_step(&run.session_id, channel_number, session.channels as u32, &run.step_name, &run.input_snapshot)
        .await
    {
        Some(report) => report,
        None => return handle_error(AppError::validation(format!("unknown pipeline step: {}", run.step_name))),
    };
    ok(serde_json::json!({
        "sessionId": run.session_id,
        "channelNumber": channel_number,
        "stepName": run.step_name,
        "success": report.success,
        "failedSteps": report.failed_steps,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotationRequest {
    pub session_id: String,
    pub channel_number: Option<i32>,
    pub body: String,
}

#[utoipa::path(post, path = "/api/admin/annotations", responses((status = 200), (status = 400)), tag = "admin")]
pub async fn create_annotation(State(state): State<AppState>, Json(req): Json<CreateAnnotationRequest>) -> Response {
    if req.body.trim().is_empty() {
        return handle_error(AppError::validation("annotation body must not be empty"));
    }
    match state.annotations.create(&req.session_id, req.channel_number, &req.body).await {
        Ok(model) => ok(model.id),
        Err(e) => handle_error(e.into()),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnotationView {
    pub id: i32,
    pub session_id: String,
    pub channel_number: Option<i32>,
    pub body: String,
    pub created_at: String,
}

impl From<crate::database::entities::annotations::Model> for AnnotationView {
    fn from(m: crate::database::entities::annotations::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            channel_number: m.channel_number,
            body: m.body,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[utoipa::path(get, path = "/api/admin/sessions/{sessionId}/annotations", responses((status = 200, body = [AnnotationView])), tag = "admin")]
pub async fn list_annotations(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.annotations.find_by_session(&session_id).await {
        Ok(rows) => ok(rows.into_iter().map(AnnotationView::from).collect::<Vec<_>>()),
        Err(e) => handle_error(e.into()),
    }
}

#[utoipa::path(delete, path = "/api/admin/annotations/{annotationId}", responses((status = 200)), tag = "admin")]
pub async fn delete_annotation(State(state): State<AppState>, Path(annotation_id): Path<i32>) -> Response {
    match state.annotations.delete(annotation_id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": true })),
        Err(e) => handle_error(e.into()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelSettingRequest {
    pub session_id: String,
    pub channel_number: i32,
    pub key: String,
    pub value: String,
}

#[utoipa::path(post, path = "/api/admin/channel-settings", responses((status = 200)), tag = "admin")]
pub async fn set_channel_setting(State(state): State<AppState>, Json(req): Json<SetChannelSettingRequest>) -> Response {
    match state.channel_settings.set(&req.session_id, req.channel_number, &req.key, &req.value).await {
        Ok(model) => ok(model.id),
        Err(e) => handle_error(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelSettingQuery {
    pub session_id: String,
    pub channel_number: i32,
    pub key: String,
}

#[utoipa::path(get, path = "/api/admin/channel-settings", responses((status = 200), (status = 404)), tag = "admin")]
pub async fn get_channel_setting(State(state): State<AppState>, Query(q): Query<ChannelSettingQuery>) -> Response {
    match state.channel_settings.get(&q.session_id, q.channel_number, &q.key).await {
        Ok(Some(model)) => ok(model.value),
        Ok(None) => handle_error(AppError::not_found("channel_setting", q.key)),
        Err(e) => handle_error(e.into()),
    }
}

#[utoipa::path(delete, path = "/api/admin/channel-settings/{settingId}", responses((status = 200)), tag = "admin")]
pub async fn delete_channel_setting(State(state): State<AppState>, Path(setting_id): Path<i32>) -> Response {
    match state.channel_settings.delete(setting_id).await {
        Ok(()) => ok(serde_json::json!({ "deleted": true })),
        Err(e) => handle_error(e.into()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRecordingRequest {
    pub session_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[utoipa::path(post, path = "/api/admin/recordings", responses((status = 200)), tag = "admin")]
pub async fn upsert_recording(State(state): State<AppState>, Json(req): Json<UpsertRecordingRequest>) -> Response {
    match state.recordings.upsert(&req.session_id, req.title, req.description, req.recorded_at).await {
        Ok(model) => ok(serde_json::json!({ "sessionId": model.session_id })),
        Err(e) => handle_error(e.into()),
    }
}

#[utoipa::path(get, path = "/api/admin/sessions/{sessionId}/recording", responses((status = 200), (status = 404)), tag = "admin")]
pub async fn get_recording(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.recordings.find_by_session(&session_id).await {
        Ok(Some(model)) => ok(serde_json::json!({
            "sessionId": model.session_id,
            "title": model.title,
            "description": model.description,
            "recordedAt": model.recorded_at,
        })),
        Ok(None) => handle_error(AppError::not_found("recording", session_id)),
        Err(e) => handle_error(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::{annotations, pipeline_runs};

    #[test]
    fn pipeline_run_view_carries_fields_from_model() {
        let model = pipeline_runs::Model {
            id: 1,
            session_id: "sess1".to_string(),
            channel_number: Some(3),
            step_name: "encode_mp3".to_string(),
            status: PipelineRunStatus::Failed,
            started_at: None,
            completed_at: None,
            duration_ms: Some(120),
            input_snapshot: "{}".to_string(),
            output_snapshot: None,
            error_message: Some("ffmpeg exited 1".to_string()),
            retry_count: 2,
            created_at: chrono::Utc::now(),
        };

        let view = PipelineRunView::from(model);

        assert_eq!(view.id, 1);
        assert_eq!(view.channel_number, Some(3));
        assert_eq!(view.status, PipelineRunStatus::Failed);
        assert_eq!(view.retry_count, 2);
    }

    #[test]
    fn annotation_view_carries_fields_from_model() {
        let model = annotations::Model {
            id: 9,
            session_id: "sess1".to_string(),
            channel_number: None,
            body: "operator note".to_string(),
            created_at: chrono::Utc::now(),
        };

        let view = AnnotationView::from(model);

        assert_eq!(view.id, 9);
        assert_eq!(view.session_id, "sess1");
        assert_eq!(view.channel_number, None);
        assert_eq!(view.body, "operator note");
    }
}
