//! `PipelineData`: the mutable record threaded through a channel's Steps
//! (§4.4).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio_toolbox::AnalyzeResult;

/// One segment file contributing to a channel, as resolved by `prefetch-flac`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSegment {
    pub segment_number: i32,
    pub channel_index_in_group: u32,
    pub local_path: PathBuf,
}

/// Accumulates outputs across the nine Default Channel Pipeline steps.
/// Fields are `Option`/`Vec` so a step's return value can carry just its own
/// delta; [`PipelineData::merge`] folds a delta into the running record,
/// treating `Some`/non-empty as "this step touched this field".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineData {
    /// prefetch-flac: ordered source segments for this channel.
    pub source_segments: Vec<SourceSegment>,
    /// extract-channel: ordered mono intermediates, one per source segment.
    pub mono_paths: Vec<PathBuf>,
    /// concatenate: single lossless mono file.
    pub concatenated_path: Option<PathBuf>,
    /// analyze-audio.
    pub analysis: Option<AnalyzeResult>,
    pub is_quiet: Option<bool>,
    pub is_silent: Option<bool>,
    /// normalize-audio: present only if normalization ran.
    pub normalized_path: Option<PathBuf>,
    /// encode-mp3.
    pub mp3_path: Option<PathBuf>,
    pub mp3_file_size: Option<u64>,
    pub duration_seconds: Option<f64>,
    /// generate-peaks.
    pub peaks_path: Option<PathBuf>,
    /// generate-hls.
    pub hls_playlist_path: Option<PathBuf>,
    pub hls_segment_paths: Vec<PathBuf>,
    /// upload-mp3/peaks/hls.
    pub mp3_s3_key: Option<String>,
    pub mp3_s3_url: Option<String>,
    pub peaks_s3_key: Option<String>,
    pub peaks_s3_url: Option<String>,
    pub hls_s3_url: Option<String>,
}

impl PipelineData {
    /// The file a downstream step should read as "the audio so far":
    /// normalized output if normalization ran, else the raw concatenation.
    pub fn working_audio_path(&self) -> Option<&PathBuf> {
        self.normalized_path.as_ref().or(self.concatenated_path.as_ref())
    }

    /// Folds `delta` into `self`, overwriting only fields the delta actually
    /// set (non-`None`/non-empty).
    pub fn merge(&mut self, delta: PipelineData) {
        if !delta.source_segments.is_empty() {
            self.source_segments = delta.source_segments;
        }
        if !delta.mono_paths.is_empty() {
            self.mono_paths = delta.mono_paths;
        }
        if delta.concatenated_path.is_some() {
            self.concatenated_path = delta.concatenated_path;
        }
        if delta.analysis.is_some() {
            self.analysis = delta.analysis;
        }
        if delta.is_quiet.is_some() {
            self.is_quiet = delta.is_quiet;
        }
        if delta.is_silent.is_some() {
            self.is_silent = delta.is_silent;
        }
        if delta.normalized_path.is_some() {
            self.normalized_path = delta.normalized_path;
        }
        if delta.mp3_path.is_some() {
            self.mp3_path = delta.mp3_path;
        }
        if delta.mp3_file_size.is_some() {
            self.mp3_file_size = delta.mp3_file_size;
        }
        if delta.duration_seconds.is_some() {
            self.duration_seconds = delta.duration_seconds;
        }
        if delta.peaks_path.is_some() {
            self.peaks_path = delta.peaks_path;
        }
        if delta.hls_playlist_path.is_some() {
            self.hls_playlist_path = delta.hls_playlist_path;
        }
        if !delta.hls_segment_paths.is_empty() {
            self.hls_segment_paths = delta.hls_segment_paths;
        }
        if delta.mp3_s3_key.is_some() {
            self.mp3_s3_key = delta.mp3_s3_key;
        }
        if delta.mp3_s3_url.is_some() {
            self.mp3_s3_url = delta.mp3_s3_url;
        }
        if delta.peaks_s3_key.is_some() {
            self.peaks_s3_key = delta.peaks_s3_key;
        }
        if delta.peaks_s3_url.is_some() {
            self.peaks_s3_url = delta.peaks_s3_url;
        }
        if delta.hls_s3_url.is_some() {
            self.hls_s3_url = delta.hls_s3_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overwrites_set_fields() {
        let mut data = PipelineData {
            mp3_path: Some(PathBuf::from("/a/b.mp3")),
            ..Default::default()
        };
        let delta = PipelineData {
            mp3_file_size: Some(42),
            ..Default::default()
        };
        data.merge(delta);
        assert_eq!(data.mp3_path, Some(PathBuf::from("/a/b.mp3")));
        assert_eq!(data.mp3_file_size, Some(42));
    }

    #[test]
    fn working_audio_prefers_normalized() {
        let data = PipelineData {
            concatenated_path: Some(PathBuf::from("/concat.flac")),
            normalized_path: Some(PathBuf::from("/norm.flac")),
            ..Default::default()
        };
        assert_eq!(data.working_audio_path(), Some(&PathBuf::from("/norm.flac")));
    }
}
