//! Session control HTTP: `/session/complete`, `/session/process`,
//! `/session/delete` (§6).

use axum::{extract::State, response::Response, Json};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::database::entities::sessions::SessionStatus;
use crate::storage::blob::{BlobLayout, ObjectKeyLayout};
use crate::web::responses::{bad_request, handle_error, ok};
use crate::web::AppState;
use crate::errors::AppError;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

/// Explicit completion (§4.3 step 3): `receiving` -> `complete`, enqueued.
#[utoipa::path(post, path = "/session/complete", responses((status = 200), (status = 400), (status = 404)), tag = "session")]
pub async fn complete_session(State(state): State<AppState>, Json(req): Json<SessionRequest>) -> Response {
    let session = match state.sessions.find_by_id(&req.session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return handle_error(AppError::not_found("session", req.session_id)),
        Err(e) => return handle_error(e.into()),
    };
    if session.status != SessionStatus::Receiving {
        return handle_error(AppError::conflict(
            "complete",
            "session",
            format!("session is {} and cannot be completed", session.status),
        ));
    }
    if !state.session_manager.mark_complete(&req.session_id).await {
        return handle_error(AppError::internal("failed to transition session to complete"));
    }
    ok(serde_json::json!({ "sessionId": req.session_id, "status": "complete" }))
}

/// Manual trigger (§4.3 step 5): forces `receiving` -> `complete` and
/// enqueues immediately, rejecting sessions already processing/processed.
#[utoipa::path(post, path = "/session/process", responses((status = 200), (status = 400), (status = 404)), tag = "session")]
pub async fn process_session(State(state): State<AppState>, Json(req): Json<SessionRequest>) -> Response {
    match state.session_manager.trigger_now(&req.session_id).await {
        Ok(()) => ok(serde_json::json!({ "sessionId": req.session_id, "status": "queued" })),
        Err(message) if message.contains("not found") => handle_error(AppError::not_found("session", req.session_id)),
        Err(message) => bad_request(message),
    }
}

/// Cascading delete (§6): local blobs, object-store prefixes, then
/// dependent rows in dependency order (pipeline_runs -> recordings ->
/// processed_channels -> segments -> sessions).
#[utoipa::path(post, path = "/session/delete", responses((status = 200), (status = 404)), tag = "session")]
pub async fn delete_session(State(state): State<AppState>, Json(req): Json<SessionRequest>) -> Response {
    let session_id = req.session_id;
    if state.sessions.find_by_id(&session_id).await.ok().flatten().is_none() {
        return handle_error(AppError::not_found("session", session_id));
    }

    if let Err(e) = state.blobs.remove_dir_all(&BlobLayout::session_dir(&session_id)).await {
        warn!(session_id = %session_id, error = %e, "failed to remove local session blobs");
    }

    if let Some(object_store) = &state.object_store {
        let layout = ObjectKeyLayout::new(&state.config.object_store);
        for prefix in layout.session_prefixes(&session_id) {
            if let Err(e) = object_store.delete_prefix(&prefix).await {
                warn!(session_id = %session_id, prefix, error = %e, "failed to bulk-delete object-store prefix");
            }
        }
    }

    if let Err(e) = state.pipeline_runs.delete_by_session(&session_id).await {
        return handle_error(e.into());
    }
    if let Err(e) = state.recordings.delete_by_session(&session_id).await {
        return handle_error(e.into());
    }
    if let Err(e) = state.processed_channels.delete_by_session(&session_id).await {
        return handle_error(e.into());
    }
    if let Err(e) = state.segments.delete_by_session(&session_id).await {
        return handle_error(e.into());
    }
    if let Err(e) = state.sessions.delete(&session_id).await {
        return handle_error(e.into());
    }

    info!(session_id = %session_id, "session deleted");
    ok(serde_json::json!({ "sessionId": session_id, "deleted": true }))
}
