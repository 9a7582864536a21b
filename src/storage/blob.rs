//! Local blob path layout and object-store key layout (§6).
//!
//! Pure path-building helpers; actual I/O goes through
//! `sandboxed_file_manager::SandboxedManager` (local) or [`super::ObjectStore`]
//! (remote). Kept side-effect free so the Ingest/Pipeline layers can compute
//! a path without awaiting anything.

use crate::config::ObjectStoreConfig;

/// Builds relative paths under the local blob root
/// (`<root>/<session>/{mp3,hls,peaks,.temp}`). All paths are relative to the
/// `SandboxedManager`'s own base directory.
pub struct BlobLayout;

impl BlobLayout {
    pub fn session_dir(session_id: &str) -> String {
        format!("{session_id}/")
    }

    pub fn segment_path(session_id: &str, received_iso: &str, segment_number: i32, group: &str, ext: &str) -> String {
        format!("{session_id}/{received_iso}_seg{segment_number:05}_{group}.{ext}")
    }

    pub fn mp3_path(session_id: &str, channel_number: i32) -> String {
        format!("{session_id}/mp3/channel_{channel_number:02}.mp3")
    }

    pub fn peaks_path(session_id: &str, channel_number: i32) -> String {
        format!("{session_id}/peaks/channel_{channel_number:02}_peaks.json")
    }

    pub fn hls_playlist_path(session_id: &str, channel_number: i32) -> String {
        format!("{session_id}/hls/channel_{channel_number:02}.m3u8")
    }

    pub fn hls_segment_pattern(session_id: &str, channel_number: i32) -> String {
        format!("{session_id}/hls/channel_{channel_number:02}_%05d.ts")
    }

    pub fn temp_dir(session_id: &str) -> String {
        format!("{session_id}/.temp/")
    }

    pub fn channel_work_dir(session_id: &str, channel_number: i32) -> String {
        format!("{session_id}/.temp/channel_{channel_number:02}/")
    }

    /// Process-global dead-letter directory for the Upload Queue (§4.2).
    pub fn failed_uploads_dir() -> &'static str {
        ".failed_uploads/"
    }
}

/// Builds object-store keys under the three configured prefixes (§6).
pub struct ObjectKeyLayout<'a> {
    config: &'a ObjectStoreConfig,
}

impl<'a> ObjectKeyLayout<'a> {
    pub fn new(config: &'a ObjectStoreConfig) -> Self {
        Self { config }
    }

    pub fn segment_key(&self, session_id: &str, received_iso: &str, segment_number: i32, group: &str, ext: &str) -> String {
        format!(
            "{}{session_id}/{received_iso}_seg{segment_number:05}_{group}.{ext}",
            self.config.segments_prefix
        )
    }

    pub fn mp3_key(&self, session_id: &str, channel_number: i32) -> String {
        format!("{}{session_id}/channel_{channel_number:02}.mp3", self.config.segments_prefix)
    }

    pub fn peaks_key(&self, session_id: &str, channel_number: i32) -> String {
        format!("{}{session_id}/channel_{channel_number:02}_peaks.json", self.config.peaks_prefix)
    }

    pub fn hls_playlist_key(&self, session_id: &str, channel_number: i32) -> String {
        format!("{}{session_id}/channel_{channel_number:02}.m3u8", self.config.hls_prefix)
    }

    pub fn hls_segment_key(&self, session_id: &str, segment_file_name: &str) -> String {
        format!("{}{session_id}/{segment_file_name}", self.config.hls_prefix)
    }

    pub fn session_prefixes(&self, session_id: &str) -> [String; 3] {
        [
            format!("{}{session_id}/", self.config.segments_prefix),
            format!("{}{session_id}/", self.config.hls_prefix),
            format!("{}{session_id}/", self.config.peaks_prefix),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp3_path_is_zero_padded() {
        assert_eq!(BlobLayout::mp3_path("sess1", 3), "sess1/mp3/channel_03.mp3");
    }

    #[test]
    fn session_prefixes_cover_segments_hls_peaks() {
        let config = ObjectStoreConfig::default();
        let layout = ObjectKeyLayout::new(&config);
        let prefixes = layout.session_prefixes("sess1");
        assert!(prefixes[0].ends_with("sess1/"));
        assert_eq!(prefixes.len(), 3);
    }
}
