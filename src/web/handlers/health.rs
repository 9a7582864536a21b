//! Liveness/readiness HTTP (§5.1 ambient stack): liveness never touches the
//! database, readiness does.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::web::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[utoipa::path(get, path = "/healthz", responses((status = 200, body = HealthResponse)), tag = "health")]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database_healthy: bool,
    pub database_response_time_ms: u128,
    pub upload_queue_depth: usize,
}

#[utoipa::path(get, path = "/readyz", responses((status = 200, body = ReadinessResponse), (status = 503)), tag = "health")]
pub async fn readiness(State(state): State<AppState>) -> Response {
    let db_health = state.database.health_check().await;
    let upload_queue_depth = match &state.upload_queue {
        Some(queue) => queue.depth().await,
        None => 0,
    };

    let status = if db_health.is_healthy { "ok" } else { "degraded" };
    let code = if db_health.is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        code,
        Json(ReadinessResponse {
            status,
            database_healthy: db_health.is_healthy,
            database_response_time_ms: db_health.response_time.as_millis(),
            upload_queue_depth,
        }),
    )
        .into_response()
}
