//! HTTP middleware: request logging, security headers, size limiting.

use axum::{
    extract::Request,
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;
use tracing::{info, warn};

use super::responses::ApiResponse;

/// Logs every request with method, URI, status, and duration.
pub async fn request_logging_middleware(method: Method, uri: Uri, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if status >= 400 {
        warn!(method = %method, uri = %uri, status, request_id = %request_id, duration_ms, "request completed with error");
    } else {
        info!(method = %method, uri = %uri, status, request_id = %request_id, duration_ms, "request completed");
    }

    response
}

/// Rejects bodies over 10MB before the handler reads them (the largest FLAC
/// segment at 18 channels / 48kHz comfortably fits under this).
pub async fn request_size_middleware(headers: HeaderMap, request: Request, next: Next) -> Response {
    const MAX_REQUEST_SIZE: usize = 64 * 1024 * 1024;

    if let Some(content_length) = headers.get("content-length")
        && let Ok(length_str) = content_length.to_str()
        && let Ok(length) = length_str.parse::<usize>()
        && length > MAX_REQUEST_SIZE
    {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ApiResponse::<()>::error(format!(
                "Request too large: {length} bytes (max: {MAX_REQUEST_SIZE})"
            ))),
        )
            .into_response();
    }

    next.run(request).await
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("Referrer-Policy", "strict-origin-when-cross-origin".parse().unwrap());
    response
}

pub async fn timeout_middleware(request: Request, next: Next) -> Response {
    const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

    match tokio::time::timeout(REQUEST_TIMEOUT, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("request timed out");
            (StatusCode::REQUEST_TIMEOUT, Json(ApiResponse::<()>::error("Request timed out".to_string())))
                .into_response()
        }
    }
}
