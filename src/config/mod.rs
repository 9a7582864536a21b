use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub object_store: ObjectStoreConfig,
    pub upload_queue: UploadQueueConfig,
    pub session_manager: SessionManagerConfig,
    pub pipeline: PipelineConfig,
    pub audio_toolbox: AudioToolboxConfig,
    pub circuitbreaker: Option<CircuitBreakerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,

    /// SQLite-specific configuration
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// PostgreSQL-specific configuration
    #[serde(default)]
    pub postgresql: PostgreSqlConfig,

    /// MySQL-specific configuration
    #[serde(default)]
    pub mysql: MySqlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: String,
    #[serde(default = "default_cache_size")]
    pub cache_size: String,
    #[serde(default = "default_wal_autocheckpoint")]
    pub wal_autocheckpoint: u32,
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
    #[serde(default = "default_synchronous")]
    pub synchronous: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgreSqlConfig {
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout: Option<String>,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Option<String>,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MySqlConfig {
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: Option<u32>,
    #[serde(default = "default_interactive_timeout")]
    pub interactive_timeout: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
    #[serde(default = "default_enable_request_logging")]
    pub enable_request_logging: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Local blob storage layout (`<root>/<session>/{mp3,hls,peaks,.temp}` plus
/// the process-global `<root>/.failed_uploads/` dead-letter directory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
    #[serde(default = "default_temp_retention")]
    pub temp_retention: String,
    #[serde(default = "default_temp_cleanup_interval")]
    pub temp_cleanup_interval: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_root: default_blob_root(),
            temp_retention: default_temp_retention(),
            temp_cleanup_interval: default_temp_cleanup_interval(),
        }
    }
}

/// Object-store connection and key-layout configuration. Credentials are not
/// read from here directly; they come from the standard AWS credential chain
/// (env vars, shared config file, IMDS). `endpoint_url` overrides the default
/// AWS endpoint for S3-compatible deployments (e.g. MinIO).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_segments_prefix")]
    pub segments_prefix: String,
    #[serde(default = "default_peaks_prefix")]
    pub peaks_prefix: String,
    #[serde(default = "default_hls_prefix")]
    pub hls_prefix: String,
    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,
    #[serde(default = "default_hls_upload_concurrency")]
    pub hls_upload_concurrency: usize,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "capture-receiver".to_string(),
            region: None,
            endpoint_url: None,
            segments_prefix: default_segments_prefix(),
            peaks_prefix: default_peaks_prefix(),
            hls_prefix: default_hls_prefix(),
            prefetch_concurrency: default_prefetch_concurrency(),
            hls_upload_concurrency: default_hls_upload_concurrency(),
        }
    }
}

/// Background upload-queue dispatcher configuration (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadQueueConfig {
    #[serde(default = "default_upload_workers")]
    pub workers: usize,
    #[serde(default = "default_upload_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_upload_max_retries")]
    pub max_retries: u32,
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self {
            workers: default_upload_workers(),
            retry_delay_secs: default_upload_retry_delay_secs(),
            max_retries: default_upload_max_retries(),
        }
    }
}

/// Session Manager timing configuration (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManagerConfig {
    #[serde(default = "default_session_timer_interval_secs")]
    pub timer_interval_secs: u64,
    #[serde(default = "default_session_timeout_minutes")]
    pub timeout_minutes: i64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            timer_interval_secs: default_session_timer_interval_secs(),
            timeout_minutes: default_session_timeout_minutes(),
        }
    }
}

/// Per-channel processing pipeline configuration (§4.4-§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_group_size")]
    pub group_size: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,
    #[serde(default)]
    pub loudness: LoudnessConfig,
    #[serde(default)]
    pub mp3: Mp3Config,
    #[serde(default)]
    pub peaks: PeaksConfig,
    #[serde(default)]
    pub hls: HlsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            loudness: LoudnessConfig::default(),
            mp3: Mp3Config::default(),
            peaks: PeaksConfig::default(),
            hls: HlsConfig::default(),
        }
    }
}

/// Quiet/silence gating and loudness-normalization targets (§4.5 steps 4-5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessConfig {
    #[serde(default = "default_quiet_threshold_db")]
    pub quiet_threshold_db: f64,
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,
    #[serde(default = "default_normalize_enabled")]
    pub normalize_enabled: bool,
    #[serde(default = "default_min_gain_lu")]
    pub min_gain_lu: f64,
    #[serde(default = "default_high_gain_threshold_db")]
    pub high_gain_threshold_db: f64,
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f64,
    #[serde(default = "default_target_true_peak_db")]
    pub target_true_peak_db: f64,
    #[serde(default = "default_target_lra")]
    pub target_lra: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            quiet_threshold_db: default_quiet_threshold_db(),
            silence_threshold_db: default_silence_threshold_db(),
            normalize_enabled: default_normalize_enabled(),
            min_gain_lu: default_min_gain_lu(),
            high_gain_threshold_db: default_high_gain_threshold_db(),
            target_lufs: default_target_lufs(),
            target_true_peak_db: default_target_true_peak_db(),
            target_lra: default_target_lra(),
        }
    }
}

/// MP3 encode settings (§4.5 step 6); VBR quality is selected lower (smaller
/// file) for quiet channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mp3Config {
    #[serde(default = "default_mp3_bitrate_kbps")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_mp3_vbr_quality_normal")]
    pub vbr_quality_normal: u32,
    #[serde(default = "default_mp3_vbr_quality_quiet")]
    pub vbr_quality_quiet: u32,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_mp3_bitrate_kbps(),
            vbr_quality_normal: default_mp3_vbr_quality_normal(),
            vbr_quality_quiet: default_mp3_vbr_quality_quiet(),
        }
    }
}

/// Waveform peaks generation settings (§4.5 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeaksConfig {
    #[serde(default = "default_peaks_pixels_per_second")]
    pub pixels_per_second: u32,
    #[serde(default = "default_peaks_bits")]
    pub bits: u32,
}

impl Default for PeaksConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: default_peaks_pixels_per_second(),
            bits: default_peaks_bits(),
        }
    }
}

/// HLS segmentation settings (§4.5 step 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsConfig {
    #[serde(default = "default_hls_segment_duration_secs")]
    pub segment_duration_secs: u32,
    #[serde(default = "default_hls_audio_bitrate_kbps")]
    pub audio_bitrate_kbps: u32,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: default_hls_segment_duration_secs(),
            audio_bitrate_kbps: default_hls_audio_bitrate_kbps(),
        }
    }
}

/// ffmpeg/ffprobe subprocess wrapper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioToolboxConfig {
    #[serde(default = "default_ffmpeg_command")]
    pub ffmpeg_command: String,
    #[serde(default = "default_ffprobe_command")]
    pub ffprobe_command: String,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout: String,
}

impl Default for AudioToolboxConfig {
    fn default() -> Self {
        Self {
            ffmpeg_command: default_ffmpeg_command(),
            ffprobe_command: default_ffprobe_command(),
            tool_timeout: default_tool_timeout(),
        }
    }
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_max_request_size() -> String {
    "10MB".to_string()
}

fn default_enable_request_logging() -> bool {
    false
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_busy_timeout() -> String {
    "5000".to_string()
}

fn default_cache_size() -> String {
    "-64000".to_string()
}

fn default_wal_autocheckpoint() -> u32 {
    1000
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_synchronous() -> String {
    "NORMAL".to_string()
}

fn default_statement_timeout() -> Option<String> {
    Some("30s".to_string())
}

fn default_idle_timeout() -> Option<String> {
    Some("10m".to_string())
}

fn default_max_lifetime() -> Option<String> {
    Some("30m".to_string())
}

fn default_wait_timeout() -> Option<u32> {
    Some(28800)
}

fn default_interactive_timeout() -> Option<u32> {
    Some(28800)
}

// Storage defaults
fn default_blob_root() -> PathBuf {
    PathBuf::from(DEFAULT_BLOB_ROOT)
}

fn default_temp_retention() -> String {
    DEFAULT_TEMP_RETENTION.to_string()
}

fn default_temp_cleanup_interval() -> String {
    DEFAULT_TEMP_CLEANUP_INTERVAL.to_string()
}

// Object store defaults
fn default_segments_prefix() -> String {
    DEFAULT_SEGMENTS_PREFIX.to_string()
}

fn default_peaks_prefix() -> String {
    DEFAULT_PEAKS_PREFIX.to_string()
}

fn default_hls_prefix() -> String {
    DEFAULT_HLS_PREFIX.to_string()
}

fn default_prefetch_concurrency() -> usize {
    DEFAULT_PREFETCH_CONCURRENCY
}

fn default_hls_upload_concurrency() -> usize {
    DEFAULT_HLS_UPLOAD_CONCURRENCY
}

// Upload queue defaults
fn default_upload_workers() -> usize {
    DEFAULT_UPLOAD_WORKERS
}

fn default_upload_retry_delay_secs() -> u64 {
    DEFAULT_UPLOAD_RETRY_DELAY_SECS
}

fn default_upload_max_retries() -> u32 {
    DEFAULT_UPLOAD_MAX_RETRIES
}

// Session manager defaults
fn default_session_timer_interval_secs() -> u64 {
    DEFAULT_SESSION_TIMER_INTERVAL_SECS
}

fn default_session_timeout_minutes() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

// Pipeline defaults
fn default_group_size() -> u32 {
    DEFAULT_GROUP_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_retry_backoff_multiplier() -> f64 {
    DEFAULT_RETRY_BACKOFF_MULTIPLIER
}

fn default_quiet_threshold_db() -> f64 {
    DEFAULT_QUIET_THRESHOLD_DB
}

fn default_silence_threshold_db() -> f64 {
    DEFAULT_SILENCE_THRESHOLD_DB
}

fn default_normalize_enabled() -> bool {
    DEFAULT_NORMALIZE_ENABLED
}

fn default_min_gain_lu() -> f64 {
    DEFAULT_MIN_GAIN_LU
}

fn default_high_gain_threshold_db() -> f64 {
    DEFAULT_HIGH_GAIN_THRESHOLD_DB
}

fn default_target_lufs() -> f64 {
    DEFAULT_TARGET_LUFS
}

fn default_target_true_peak_db() -> f64 {
    DEFAULT_TARGET_TRUE_PEAK_DB
}

fn default_target_lra() -> f64 {
    DEFAULT_TARGET_LRA
}

fn default_mp3_bitrate_kbps() -> u32 {
    DEFAULT_MP3_BITRATE_KBPS
}

fn default_mp3_vbr_quality_normal() -> u32 {
    DEFAULT_MP3_VBR_QUALITY_NORMAL
}

fn default_mp3_vbr_quality_quiet() -> u32 {
    DEFAULT_MP3_VBR_QUALITY_QUIET
}

fn default_peaks_pixels_per_second() -> u32 {
    DEFAULT_PEAKS_PIXELS_PER_SECOND
}

fn default_peaks_bits() -> u32 {
    DEFAULT_PEAKS_BITS
}

fn default_hls_segment_duration_secs() -> u32 {
    DEFAULT_HLS_SEGMENT_DURATION_SECS
}

fn default_hls_audio_bitrate_kbps() -> u32 {
    DEFAULT_HLS_AUDIO_BITRATE_KBPS
}

fn default_ffmpeg_command() -> String {
    DEFAULT_FFMPEG_COMMAND.to_string()
}

fn default_ffprobe_command() -> String {
    DEFAULT_FFPROBE_COMMAND.to_string()
}

fn default_tool_timeout() -> String {
    DEFAULT_TOOL_TIMEOUT.to_string()
}

/// Circuit breaker configuration with support for named profiles
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema, Default)]
pub struct CircuitBreakerConfig {
    /// Global circuit breaker settings that apply to all profiles unless overridden
    #[serde(default)]
    pub global: CircuitBreakerProfileConfig,

    /// Named circuit breaker profiles for different services
    /// Example: object_store, database
    #[serde(default)]
    pub profiles: std::collections::HashMap<String, CircuitBreakerProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CircuitBreakerProfileConfig {
    /// Circuit breaker implementation type: "simple" or "noop"
    #[serde(default = "default_circuit_breaker_type")]
    pub implementation_type: String,

    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Timeout duration for individual operations (e.g., "5s", "30s")
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: String,

    /// How long to wait before attempting to close the circuit (e.g., "30s", "1m")
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: String,

    /// Number of consecutive successes needed to close circuit from half-open state
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_circuit_breaker_type() -> String {
    "simple".to_string()
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_operation_timeout() -> String {
    "5s".to_string()
}

fn default_reset_timeout() -> String {
    "30s".to_string()
}

fn default_success_threshold() -> u32 {
    2
}

impl Default for CircuitBreakerProfileConfig {
    fn default() -> Self {
        Self {
            implementation_type: default_circuit_breaker_type(),
            failure_threshold: default_failure_threshold(),
            operation_timeout: default_operation_timeout(),
            reset_timeout: default_reset_timeout(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            busy_timeout: default_busy_timeout(),
            cache_size: default_cache_size(),
            wal_autocheckpoint: default_wal_autocheckpoint(),
            journal_mode: default_journal_mode(),
            synchronous: default_synchronous(),
        }
    }
}

impl Default for PostgreSqlConfig {
    fn default() -> Self {
        Self {
            statement_timeout: default_statement_timeout(),
            idle_timeout: default_idle_timeout(),
            max_lifetime: default_max_lifetime(),
        }
    }
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            wait_timeout: default_wait_timeout(),
            interactive_timeout: default_interactive_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
                sqlite: SqliteConfig::default(),
                postgresql: PostgreSqlConfig::default(),
                mysql: MySqlConfig::default(),
            },
            web: WebConfig {
                host: default_host(),
                port: default_port(),
                request_timeout: default_request_timeout(),
                max_request_size: default_max_request_size(),
                enable_request_logging: default_enable_request_logging(),
                user_agent: default_user_agent(),
            },
            storage: StorageConfig::default(),
            object_store: ObjectStoreConfig::default(),
            upload_queue: UploadQueueConfig::default(),
            session_manager: SessionManagerConfig::default(),
            pipeline: PipelineConfig::default(),
            audio_toolbox: AudioToolboxConfig::default(),
            circuitbreaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !std::path::Path::new(config_file).exists() {
            tracing::warn!(
                "Config file '{}' not found, using default configuration values",
                config_file
            );

            let default_config = Self::default();
            let config: Config = Figment::new()
                .merge(figment::providers::Serialized::defaults(default_config))
                .merge(Env::prefixed("CAPTURE_RECEIVER_").split("__"))
                .extract()?;

            return Ok(config);
        }

        let config: Config = Figment::new()
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("CAPTURE_RECEIVER_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_pipeline_settings() {
        let config = Config::default();
        assert_eq!(config.pipeline.group_size, 6);
        assert!(config.pipeline.loudness.target_lufs < 0.0);
        assert_eq!(config.upload_queue.workers, 2);
    }

    #[test]
    fn load_from_file_falls_back_to_defaults_when_missing() {
        let config = Config::load_from_file("/nonexistent/config.toml").unwrap();
        assert_eq!(config.web.port, DEFAULT_PORT);
    }
}
