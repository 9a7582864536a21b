//! Channel-Group Algebra (§4.7): partitions *N* session channels into fixed
//! groups of size *G* and resolves a channel number to its group name and
//! within-group index.

/// One contiguous channel group `[lower, upper]` (both inclusive, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelGroup {
    pub lower: u32,
    pub upper: u32,
}

impl ChannelGroup {
    /// `ch` + zero-padded 2-digit lower bound + `-` + zero-padded upper bound.
    pub fn name(&self) -> String {
        format!("ch{:02}-{:02}", self.lower, self.upper)
    }

    pub fn contains(&self, channel: u32) -> bool {
        channel >= self.lower && channel <= self.upper
    }

    /// 0-based position of `channel` within this group.
    pub fn within_group_index(&self, channel: u32) -> Option<u32> {
        self.contains(channel).then_some(channel - self.lower)
    }
}

/// Partitions `[1..=total_channels]` into groups of size `group_size`.
pub fn partition_groups(total_channels: u32, group_size: u32) -> Vec<ChannelGroup> {
    if total_channels == 0 || group_size == 0 {
        return Vec::new();
    }
    let mut groups = Vec::new();
    let mut lower = 1;
    while lower <= total_channels {
        let upper = (lower + group_size - 1).min(total_channels);
        groups.push(ChannelGroup { lower, upper });
        lower = upper + 1;
    }
    groups
}

/// Resolves the unique group containing `channel` (1-based) given
/// `total_channels` and `group_size`.
pub fn group_for_channel(channel: u32, total_channels: u32, group_size: u32) -> Option<ChannelGroup> {
    partition_groups(total_channels, group_size)
        .into_iter()
        .find(|g| g.contains(channel))
}

/// Parses a group name of shape `ch<lower>-<upper>` back into a
/// [`ChannelGroup`]. Returns `None` for the reserved `unknown` label or any
/// unparseable string; callers must skip rather than error (§4.7: "tolerant
/// of empty/unknown group labels").
pub fn parse_group_name(name: &str) -> Option<ChannelGroup> {
    let rest = name.strip_prefix("ch")?;
    let (lower_str, upper_str) = rest.split_once('-')?;
    let lower = lower_str.parse().ok()?;
    let upper = upper_str.parse().ok()?;
    Some(ChannelGroup { lower, upper })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_exact_multiple() {
        let groups = partition_groups(18, 6);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name(), "ch01-06");
        assert_eq!(groups[1].name(), "ch07-12");
        assert_eq!(groups[2].name(), "ch13-18");
    }

    #[test]
    fn partitions_with_remainder() {
        let groups = partition_groups(20, 6);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[3].name(), "ch19-20");
    }

    #[test]
    fn within_group_index_is_zero_based() {
        let group = ChannelGroup { lower: 7, upper: 12 };
        assert_eq!(group.within_group_index(7), Some(0));
        assert_eq!(group.within_group_index(9), Some(2));
        assert_eq!(group.within_group_index(13), None);
    }

    #[test]
    fn group_for_channel_finds_unique_group() {
        let group = group_for_channel(9, 18, 6).unwrap();
        assert_eq!(group.name(), "ch07-12");
    }

    #[test]
    fn unknown_group_name_does_not_parse() {
        assert!(parse_group_name("unknown").is_none());
    }

    #[test]
    fn parses_group_name_round_trip() {
        let group = parse_group_name("ch01-06").unwrap();
        assert_eq!(group, ChannelGroup { lower: 1, upper: 6 });
    }
}
