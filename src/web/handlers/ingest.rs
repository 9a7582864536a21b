//! `POST /stream` (§6 Ingest HTTP, §4.1 Ingest plane).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::database::repositories::NewSegment;
use crate::storage::blob::{BlobLayout, ObjectKeyLayout};
use crate::upload_queue::UploadItem;
use crate::web::responses::{bad_request, handle_error};
use crate::web::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub success: bool,
    pub session_id: String,
    pub segment_number: i32,
    pub channel_group: String,
    pub size: usize,
    pub local_path: String,
    pub s3_queued: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Accepts one raw audio segment. Headers carry addressing metadata that, if
/// missing, are recovered from the `content-disposition` filename (§4.1
/// steps 1-2).
#[utoipa::path(
    post,
    path = "/stream",
    responses((status = 200, body = IngestResponse), (status = 400), (status = 500)),
    tag = "ingest"
)]
pub async fn ingest_segment(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if body.is_empty() {
        return bad_request("request body is empty");
    }

    let session_id = header_str(&headers, "x-session-id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("session_{}", Utc::now().timestamp_millis()));

    let sample_rate: i32 = header_str(&headers, "x-sample-rate")
        .and_then(|v| v.parse().ok())
        .unwrap_or(48000);
    let channels: i32 = header_str(&headers, "x-channels").and_then(|v| v.parse().ok()).unwrap_or(18);

    let filename = header_str(&headers, "content-disposition")
        .and_then(|cd| cd.split("filename=").nth(1))
        .map(|f| f.trim_matches('"').to_string());

    let channel_group = header_str(&headers, "x-channel-group")
        .map(str::to_string)
        .or_else(|| filename.as_deref().and_then(crate::web::utils::parse_channel_group_from_filename))
        .unwrap_or_else(|| "unknown".to_string());

    let segment_number = header_str(&headers, "x-segment-number")
        .and_then(|v| v.parse().ok())
        .or_else(|| filename.as_deref().and_then(crate::web::utils::parse_segment_number_from_filename))
        .unwrap_or(0);

    let content_type = header_str(&headers, "content-type").unwrap_or("audio/wav");
    let ext = if content_type.contains("flac") { "flac" } else { "wav" };

    if let Err(e) = state.sessions.upsert_receiving(&session_id, sample_rate, channels).await {
        return handle_error(e.into());
    }

    let received_iso = Utc::now().to_rfc3339();
    let local_path = BlobLayout::segment_path(&session_id, &received_iso, segment_number, &channel_group, ext);
    let size = body.len();

    if let Err(e) = state.blobs.write(&local_path, body.to_vec()).await {
        warn!(session_id = %session_id, error = %e, "failed to write segment to local blob store");
        return handle_error(crate::errors::AppError::internal(format!("failed to persist segment: {e}")));
    }

    let segment = match state
        .segments
        .upsert(NewSegment {
            session_id: session_id.clone(),
            segment_number,
            channel_group: channel_group.clone(),
            local_path: local_path.clone(),
            file_size: size as i64,
        })
        .await
    {
        Ok(segment) => segment,
        Err(e) => return handle_error(e.into()),
    };

    if let Err(e) = state.sessions.touch(&session_id).await {
        warn!(session_id = %session_id, error = %e, "failed to refresh session updated_at");
    }

    let s3_queued = state.upload_queue.is_some();
    if let Some(upload_queue) = &state.upload_queue {
        let object_key = ObjectKeyLayout::new(&state.config.object_store).segment_key(
            &session_id,
            &received_iso,
            segment_number,
            &channel_group,
            ext,
        );
        upload_queue
            .enqueue(UploadItem {
                local_path: local_path.clone(),
                object_key,
                content_type: content_type.to_string(),
                segment_id: Some(segment.id),
                retries: 0,
            })
            .await;
        state.observability.uploads_enqueued.add(1, &[]);
    }

    state.observability.segments_received.add(1, &[]);
    state.observability.segment_bytes_received.add(size as u64, &[]);
    info!(session_id = %session_id, segment_number, channel_group = %channel_group, size, "segment received");

    (
        StatusCode::OK,
        Json(IngestResponse {
            success: true,
            session_id,
            segment_number,
            channel_group,
            size,
            local_path,
            s3_queued,
        }),
    )
        .into_response()
}
