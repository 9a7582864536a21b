//! OpenAPI specification generation using utoipa annotations on handler
//! functions, served interactively via Swagger UI.

use utoipa::OpenApi;

use super::handlers::{admin, health, ingest, regenerate, session};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Capture Receiver API",
        description = "Receiver-side backbone for multi-channel live-audio capture: ingestion, session lifecycle, upload queue, and per-channel processing pipeline.",
        license(name = "MIT")
    ),
    tags(
        (name = "ingest", description = "Segment ingestion"),
        (name = "session", description = "Session lifecycle control"),
        (name = "regenerate", description = "Pipeline output regeneration"),
        (name = "admin", description = "Pipeline run visibility, replay, annotations, channel settings, recordings"),
        (name = "health", description = "Liveness and readiness probes"),
    ),
    components(schemas(
        ingest::IngestResponse,
        session::SessionRequest,
        regenerate::RegenerateRequest,
        regenerate::ChannelRegenerateResult,
        admin::PipelineRunView,
        admin::CreateAnnotationRequest,
        admin::AnnotationView,
        admin::SetChannelSettingRequest,
        admin::UpsertRecordingRequest,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    paths(
        ingest::ingest_segment,
        session::complete_session,
        session::process_session,
        session::delete_session,
        regenerate::regenerate_session,
        regenerate::regenerate_mp3,
        regenerate::regenerate_mp3_channel,
        regenerate::regenerate_peaks_channel,
        admin::list_pipeline_runs,
        admin::retry_pipeline_run,
        admin::create_annotation,
        admin::list_annotations,
        admin::delete_annotation,
        admin::set_channel_setting,
        admin::get_channel_setting,
        admin::delete_channel_setting,
        admin::upsert_recording,
        admin::get_recording,
        health::liveness,
        health::readiness,
    )
)]
pub struct ApiDoc;
