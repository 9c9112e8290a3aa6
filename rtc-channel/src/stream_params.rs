/// StreamParams describes one media stream (one sender) by its SSRCs.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub groupid: String,
    pub id: String,
    pub ssrcs: Vec<u32>,
    pub cname: String,
}

impl StreamParams {
    pub fn with_ssrc(ssrc: u32) -> Self {
        StreamParams {
            ssrcs: vec![ssrc],
            ..Default::default()
        }
    }

    /// first_ssrc is the primary SSRC, or 0 when the stream has none.
    pub fn first_ssrc(&self) -> u32 {
        self.ssrcs.first().copied().unwrap_or(0)
    }

    pub fn has_ssrcs(&self) -> bool {
        !self.ssrcs.is_empty()
    }

    pub fn has_ssrc(&self, ssrc: u32) -> bool {
        self.ssrcs.contains(&ssrc)
    }
}

pub fn get_stream_by_ids<'a>(
    streams: &'a [StreamParams],
    groupid: &str,
    id: &str,
) -> Option<&'a StreamParams> {
    streams.iter().find(|s| s.groupid == groupid && s.id == id)
}

pub fn get_stream_by_ssrc(streams: &[StreamParams], ssrc: u32) -> Option<&StreamParams> {
    streams.iter().find(|s| s.has_ssrc(ssrc))
}

/// remove_stream_by_ssrc removes every stream carrying `ssrc` and tells
/// whether anything was removed.
pub fn remove_stream_by_ssrc(streams: &mut Vec<StreamParams>, ssrc: u32) -> bool {
    let before = streams.len();
    streams.retain(|s| !s.has_ssrc(ssrc));
    streams.len() != before
}

#[cfg(test)]
mod test {
    use super::*;

    fn stream(groupid: &str, id: &str, ssrcs: &[u32]) -> StreamParams {
        StreamParams {
            groupid: groupid.to_owned(),
            id: id.to_owned(),
            ssrcs: ssrcs.to_vec(),
            cname: "cname".to_owned(),
        }
    }

    #[test]
    fn test_lookup() {
        let streams = vec![stream("g", "a", &[1, 2]), stream("g", "b", &[3])];

        assert_eq!(get_stream_by_ssrc(&streams, 2).map(|s| s.id.as_str()), Some("a"));
        assert!(get_stream_by_ssrc(&streams, 4).is_none());
        assert_eq!(get_stream_by_ids(&streams, "g", "b").map(|s| s.first_ssrc()), Some(3));
        assert!(get_stream_by_ids(&streams, "h", "b").is_none());
    }

    #[test]
    fn test_remove_by_ssrc() {
        let mut streams = vec![stream("g", "a", &[1, 2]), stream("g", "b", &[3])];

        assert!(remove_stream_by_ssrc(&mut streams, 2));
        assert_eq!(streams.len(), 1);
        assert!(!remove_stream_by_ssrc(&mut streams, 2));
    }

    #[test]
    fn test_first_ssrc() {
        assert_eq!(StreamParams::default().first_ssrc(), 0);
        assert!(!StreamParams::default().has_ssrcs());
        assert_eq!(StreamParams::with_ssrc(7).first_ssrc(), 7);
    }
}
