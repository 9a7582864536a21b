use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use capture_receiver::{
    audio_toolbox::{AudioToolbox, FfmpegAudioToolbox},
    config::Config,
    database::{
        repositories::{
            AnnotationRepository, ChannelSettingRepository, PipelineRunRepository,
            ProcessedChannelRepository, RecordingRepository, SegmentRepository, SessionRepository,
        },
        Database,
    },
    observability::AppObservability,
    pipeline::{ChannelProcessor, SessionProcessor, StepDeps},
    session_manager::SessionManager,
    storage::{ObjectStore, S3ObjectStore},
    upload_queue::UploadQueue,
    web::{AppState, WebServer},
};
use sandboxed_file_manager::{CleanupPolicy, SandboxedManager, TimeMatch};
use tokio_util::sync::CancellationToken;

fn get_dependencies() -> Result<Value, Box<dyn std::error::Error>> {
    let sbom_str = include_str!(concat!(env!("OUT_DIR"), "/sbom.json"));
    let sbom: Value = serde_json::from_str(sbom_str)?;
    Ok(sbom)
}

fn print_version_info() {
    println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("Build Information:");
    println!("  Target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
    if let Ok(rustc_version) = std::env::var("RUSTC_VERSION") {
        println!("  Rust: {}", rustc_version);
    }
    println!();
    println!("Software Bill of Materials:");

    match get_dependencies() {
        Ok(sbom) => {
            let mut dependencies = Vec::new();
            if let Some(packages) = sbom["packages"].as_array() {
                for package in packages {
                    if let (Some(name), Some(version)) =
                        (package["name"].as_str(), package["versionInfo"].as_str())
                    {
                        if name != env!("CARGO_PKG_NAME") && !version.contains("path+") {
                            dependencies.push((name.to_string(), version.to_string()));
                        }
                    }
                }
            }
            dependencies.sort_by(|a, b| a.0.cmp(&b.0));
            if dependencies.is_empty() {
                println!("  (No external components found in SBOM)");
            } else {
                for (name, version) in dependencies {
                    println!("  {}: {}", name, version);
                }
            }
        }
        Err(_) => println!("  (Unable to read SBOM data)"),
    }

    println!();
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
}

#[derive(Parser)]
#[command(name = "capture-receiver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-channel live-audio capture receiver backend")]
#[command(long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Print version information including dependency versions
    #[arg(short = 'v', long)]
    version: bool,
}

fn parse_duration(duration_str: &str) -> Result<std::time::Duration> {
    humantime::parse_duration(duration_str)
        .map_err(|e| anyhow::anyhow!("invalid duration '{}': {}", duration_str, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        print_version_info();
        return Ok(());
    }

    let log_filter = format!("capture_receiver={}", cli.log_level);
    let initial_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into());
    tracing_subscriber::registry()
        .with(initial_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting capture receiver v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!(config_file = %cli.config, "configuration loaded");

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database, &config).await?;
    database.migrate().await?;
    info!(database_url = %config.database.url, "database connection established and migrations applied");

    let connection = database.connection();
    let sessions = Arc::new(SessionRepository::new(connection.clone()));
    let segments = Arc::new(SegmentRepository::new(connection.clone()));
    let processed_channels = Arc::new(ProcessedChannelRepository::new(connection.clone()));
    let pipeline_runs = Arc::new(PipelineRunRepository::new(connection.clone()));
    let annotations = Arc::new(AnnotationRepository::new(connection.clone()));
    let channel_settings = Arc::new(ChannelSettingRepository::new(connection.clone()));
    let recordings = Arc::new(RecordingRepository::new(connection.clone()));

    let blobs = SandboxedManager::builder()
        .base_directory(&config.storage.blob_root)
        .cleanup_policy(
            CleanupPolicy::new()
                .remove_after(parse_duration(&config.storage.temp_retention)?)
                .time_match(TimeMatch::LastAccess),
        )
        .cleanup_interval(parse_duration(&config.storage.temp_cleanup_interval)?)
        .build()
        .await?;
    info!(
        blob_root = ?config.storage.blob_root,
        retention = %config.storage.temp_retention,
        "local blob store initialized"
    );

    // An empty bucket name means the deployment has no object store
    // configured and runs local-disk-only (§4.5 step 9 "skipped if object
    // store is disabled").
    let object_store: Option<Arc<dyn ObjectStore>> = if config.object_store.bucket.is_empty() {
        info!("object store bucket not configured, running in local-disk-only mode");
        None
    } else {
        Some(Arc::new(S3ObjectStore::new(&config.object_store).await))
    };

    let upload_queue = object_store.clone().map(|store| {
        UploadQueue::new(store, blobs.clone(), segments.clone(), config.upload_queue.clone())
    });

    let toolbox: Arc<dyn AudioToolbox> = Arc::new(FfmpegAudioToolbox::new(&config.audio_toolbox));

    let step_deps = StepDeps {
        toolbox,
        blobs: blobs.clone(),
        object_store: object_store.clone(),
        object_store_config: config.object_store.clone(),
        segments: segments.clone(),
        channel_settings: channel_settings.clone(),
        config: config.pipeline.clone(),
    };

    let channel_processor = Arc::new(ChannelProcessor::new(
        step_deps,
        pipeline_runs.clone(),
        processed_channels.clone(),
        &config,
    ));

    let session_processor = Arc::new(SessionProcessor::new(
        sessions.clone(),
        segments.clone(),
        channel_processor.clone(),
        config.storage.blob_root.join(".temp"),
    ));

    let session_manager = SessionManager::new(sessions.clone(), session_processor, config.session_manager.clone());
    session_manager.recover_at_startup().await;
    info!("session manager recovered incomplete sessions from last run");

    let observability = AppObservability::new("capture-receiver")?;

    let state = AppState {
        database: database.clone(),
        config: config.clone(),
        sessions,
        segments,
        processed_channels,
        pipeline_runs,
        annotations,
        channel_settings,
        recordings,
        channel_processor,
        session_manager: session_manager.clone(),
        upload_queue: upload_queue.clone(),
        object_store,
        blobs,
        observability,
    };

    let web_server = WebServer::new(&config, state)?;
    info!(host = %web_server.host(), port = web_server.port(), "starting web server");

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let cancellation_token = CancellationToken::new();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("web server is now listening, starting background loops"),
        Ok(Err(bind_error)) => {
            tracing::error!("failed to bind web server: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("web server task completed without signaling");
            return Err(anyhow::anyhow!("web server failed to start"));
        }
    }

    if let Some(upload_queue) = upload_queue {
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            upload_queue.run(token).await;
        });
    }

    {
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            session_manager.run(token).await;
        });
    }

    tokio::spawn({
        let token = cancellation_token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received, draining background loops");
                token.cancel();
            }
        }
    });

    info!("all services started successfully");
    server_handle.await?;

    Ok(())
}
