use std::collections::HashSet;

use log::trace;

use crate::rtp_utils::parse_rtp_header;
use crate::stream_params::StreamParams;

const RTP_VERSION: u8 = 2;

/// BundleFilter decides whether an incoming RTP packet belongs to this
/// channel. A packet is accepted when its payload type was negotiated and,
/// once the remote side has signaled streams, when its SSRC is one of them.
/// RTCP is never filtered here.
#[derive(Default, Debug, Clone)]
pub struct BundleFilter {
    payload_types: HashSet<u8>,
    ssrcs: HashSet<u32>,
}

impl BundleFilter {
    pub fn new() -> Self {
        BundleFilter::default()
    }

    pub fn add_payload_type(&mut self, payload_type: u8) {
        self.payload_types.insert(payload_type);
    }

    pub fn find_payload_type(&self, payload_type: u8) -> bool {
        self.payload_types.contains(&payload_type)
    }

    pub fn clear_payload_types(&mut self) {
        self.payload_types.clear();
    }

    /// set_streams replaces the accepted SSRCs with every SSRC of `streams`.
    pub fn set_streams(&mut self, streams: &[StreamParams]) {
        self.ssrcs = streams
            .iter()
            .flat_map(|stream| stream.ssrcs.iter().copied())
            .collect();
    }

    pub fn find_stream(&self, ssrc: u32) -> bool {
        self.ssrcs.contains(&ssrc)
    }

    /// demux_packet returns true when `data` is RTP for this channel.
    pub fn demux_packet(&self, data: &[u8]) -> bool {
        let Some(header) = parse_rtp_header(data) else {
            return false;
        };
        if header.version != RTP_VERSION {
            trace!("not rtp: version {}", header.version);
            return false;
        }
        if !self.find_payload_type(header.payload_type) {
            trace!("unknown payload type {}", header.payload_type);
            return false;
        }
        if !self.ssrcs.is_empty() && !self.find_stream(header.ssrc) {
            trace!("unknown ssrc {}", header.ssrc);
            return false;
        }
        true
    }
}
