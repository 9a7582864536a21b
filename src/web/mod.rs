//! Web layer module
//!
//! Thin HTTP handlers over the Ingest/Session/Pipeline/Upload Queue
//! collaborators, organized by the four planes of the Admin HTTP surface
//! (§6, §6.1): Ingest, Session control, Regeneration, Admin, plus
//! liveness/readiness.

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::database::{
    repositories::{
        AnnotationRepository, ChannelSettingRepository, PipelineRunRepository,
        ProcessedChannelRepository, RecordingRepository, SegmentRepository, SessionRepository,
    },
    Database,
};
use crate::observability::AppObservability;
use crate::pipeline::ChannelProcessor;
use crate::session_manager::SessionManager;
use crate::storage::ObjectStore;
use crate::upload_queue::UploadQueue;
use sandboxed_file_manager::SandboxedManager;

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod responses;
pub mod utils;

pub use extractors::{PaginationParams, RequestContext};
pub use responses::{handle_error, ApiResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: Config,
    pub sessions: Arc<SessionRepository>,
    pub segments: Arc<SegmentRepository>,
    pub processed_channels: Arc<ProcessedChannelRepository>,
    pub pipeline_runs: Arc<PipelineRunRepository>,
    pub annotations: Arc<AnnotationRepository>,
    pub channel_settings: Arc<ChannelSettingRepository>,
    pub recordings: Arc<RecordingRepository>,
    pub channel_processor: Arc<ChannelProcessor>,
    pub session_manager: Arc<SessionManager>,
    pub upload_queue: Option<Arc<UploadQueue>>,
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub blobs: SandboxedManager,
    pub observability: AppObservability,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    fn create_router(state: AppState) -> Router {
        use handlers::{admin, health, ingest, regenerate, session};

        let ingest_routes = Router::new().route("/stream", post(ingest::ingest_segment));

        let session_routes = Router::new()
            .route("/session/complete", post(session::complete_session))
            .route("/session/process", post(session::process_session))
            .route("/session/delete", post(session::delete_session))
            .route("/session/regenerate", post(regenerate::regenerate_session))
            .route("/session/regenerate-mp3", post(regenerate::regenerate_mp3))
            .route(
                "/session/regenerate-mp3-channel",
                post(regenerate::regenerate_mp3_channel),
            )
            .route(
                "/session/regenerate-peaks-channel",
                post(regenerate::regenerate_peaks_channel),
            );

        let admin_routes = Router::new()
            .route(
                "/api/admin/sessions/{sessionId}/pipeline-runs",
                get(admin::list_pipeline_runs),
            )
            .route(
                "/api/admin/pipeline-runs/{runId}/retry",
                post(admin::retry_pipeline_run),
            )
            .route(
                "/api/admin/annotations",
                post(admin::create_annotation),
            )
            .route(
                "/api/admin/sessions/{sessionId}/annotations",
                get(admin::list_annotations),
            )
            .route(
                "/api/admin/annotations/{annotationId}",
                delete(admin::delete_annotation),
            )
            .route(
                "/api/admin/channel-settings",
                post(admin::set_channel_setting).get(admin::get_channel_setting),
            )
            .route(
                "/api/admin/channel-settings/{settingId}",
                delete(admin::delete_channel_setting),
            )
            .route("/api/admin/recordings", post(admin::upsert_recording))
            .route(
                "/api/admin/sessions/{sessionId}/recording",
                get(admin::get_recording),
            );

        let health_routes = Router::new()
            .route("/healthz", get(health::liveness))
            .route("/readyz", get(health::readiness));

        Router::new()
            .merge(ingest_routes)
            .merge(session_routes)
            .merge(admin_routes)
            .merge(health_routes)
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
            .layer(axum::middleware::from_fn(middleware::timeout_middleware))
            .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
            .layer(axum::middleware::from_fn(middleware::request_size_middleware))
            .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    /// Serve with a notification when the server is actually listening or
    /// has failed to bind, so the caller can gate startup (e.g. a health
    /// probe, recovery kickoff) on a real bind rather than a guess.
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));
                axum::serve(listener, self.app).await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
