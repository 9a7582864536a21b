//! Small web-layer helpers shared across handlers.

use uuid::Uuid;

/// Parses a `content-disposition` filename of shape `...(ch\d+-\d+)...(wav|flac)`
/// to recover a channel group when the `x-channel-group` header is absent
/// (§4.1 step 1).
pub fn parse_channel_group_from_filename(filename: &str) -> Option<String> {
    let start = filename.find("ch")?;
    let rest = &filename[start..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit() && c != 'c' && c != 'h' && c != '-')?;
    let candidate = &rest[..digits_end];
    crate::pipeline::channel_group::parse_group_name(candidate).map(|_| candidate.to_string())
}

/// Parses a segment number out of the same filename shape, when the
/// `x-segment-number` header is absent (§4.1 step 2).
pub fn parse_segment_number_from_filename(filename: &str) -> Option<i32> {
    let start = filename.find("seg")? + 3;
    let rest = &filename[start..];
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..digits_end].parse().ok()
}

pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_group_from_filename() {
        assert_eq!(
            parse_channel_group_from_filename("session_ch01-06_seg00003.flac"),
            Some("ch01-06".to_string())
        );
        assert_eq!(parse_channel_group_from_filename("no_group_here.wav"), None);
    }

    #[test]
    fn parses_segment_number_from_filename() {
        assert_eq!(parse_segment_number_from_filename("session_seg00042_ch01-06.flac"), Some(42));
        assert_eq!(parse_segment_number_from_filename("no_segment_here.wav"), None);
    }
}
