//! Configuration default values
//!
//! This module contains all the default values for configuration options,
//! making them easily changeable in one central location.

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/capture-receiver.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Local blob storage defaults
pub const DEFAULT_BLOB_ROOT: &str = "./data/blobs";
pub const DEFAULT_TEMP_RETENTION: &str = "5m";
pub const DEFAULT_TEMP_CLEANUP_INTERVAL: &str = "1m";

// Object store defaults
pub const DEFAULT_SEGMENTS_PREFIX: &str = "segments/";
pub const DEFAULT_PEAKS_PREFIX: &str = "peaks/";
pub const DEFAULT_HLS_PREFIX: &str = "hls/";
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_HLS_UPLOAD_CONCURRENCY: usize = 10;

// Upload queue defaults
pub const DEFAULT_UPLOAD_WORKERS: usize = 2;
pub const DEFAULT_UPLOAD_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_UPLOAD_MAX_RETRIES: u32 = 5;

// Session manager defaults
pub const DEFAULT_SESSION_TIMER_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 10;

// Pipeline defaults
pub const DEFAULT_GROUP_SIZE: u32 = 6;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_QUIET_THRESHOLD_DB: f64 = -40.0;
pub const DEFAULT_SILENCE_THRESHOLD_DB: f64 = -50.0;
pub const DEFAULT_NORMALIZE_ENABLED: bool = true;
pub const DEFAULT_MIN_GAIN_LU: f64 = 1.0;
pub const DEFAULT_HIGH_GAIN_THRESHOLD_DB: f64 = 20.0;
pub const DEFAULT_TARGET_LUFS: f64 = -16.0;
pub const DEFAULT_TARGET_TRUE_PEAK_DB: f64 = -1.5;
pub const DEFAULT_TARGET_LRA: f64 = 11.0;
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 128;
pub const DEFAULT_MP3_VBR_QUALITY_NORMAL: u32 = 2;
pub const DEFAULT_MP3_VBR_QUALITY_QUIET: u32 = 6;
pub const DEFAULT_PEAKS_PIXELS_PER_SECOND: u32 = 100;
pub const DEFAULT_PEAKS_BITS: u32 = 8;
pub const DEFAULT_HLS_SEGMENT_DURATION_SECS: u32 = 6;
pub const DEFAULT_HLS_AUDIO_BITRATE_KBPS: u32 = 128;

// Audio toolbox defaults
pub const DEFAULT_FFMPEG_COMMAND: &str = "ffmpeg";
pub const DEFAULT_FFPROBE_COMMAND: &str = "ffprobe";
pub const DEFAULT_TOOL_TIMEOUT: &str = "10m";
