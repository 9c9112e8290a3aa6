use rand::{Rng, rng};

// match_range is a MatchFunc that accepts packets with the first byte in [lower..upper]
fn match_range(lower: u8, upper: u8) -> impl Fn(&[u8]) -> bool {
    move |buf: &[u8]| -> bool {
        if buf.is_empty() {
            return false;
        }
        let b = buf[0];
        b >= lower && b <= upper
    }
}

/// MatchFuncs as described in RFC7983
/// <https://tools.ietf.org/html/rfc7983>
///              +----------------+
///              |        [0..3] -+--> forward to STUN
///              |                |
///              |      [20..63] -+--> forward to DTLS
///              |                |
///              |    [128..191] -+--> forward to RTP/RTCP
///              +----------------+
/// match_dtls is a MatchFunc that accepts packets with the first byte in [20..63]
pub fn match_dtls(b: &[u8]) -> bool {
    match_range(20, 63)(b)
}

// match_srtp_or_srtcp is a MatchFunc that accepts packets with the first byte in [128..191]
// as defied in RFC7983
pub fn match_srtp_or_srtcp(b: &[u8]) -> bool {
    match_range(128, 191)(b)
}

/// is_rtcp checks the full second octet against the RTCP packet type range
/// [192..223].
pub fn is_rtcp(buf: &[u8]) -> bool {
    // Not long enough to determine RTP/RTCP
    if buf.len() < 4 {
        return false;
    }

    let rtcp_packet_type = buf[1];
    (192..=223).contains(&rtcp_packet_type)
}

/// is_rtcp_mux_packet applies the RFC 5761 section 4 heuristic used when RTP
/// and RTCP share one transport: the low 7 bits of the second octet fall in
/// [64..95] for RTCP, which keeps the RTP marker bit out of the decision.
pub fn is_rtcp_mux_packet(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }

    let packet_type = buf[1] & 0x7F;
    (64..=95).contains(&packet_type)
}

/// match_srtp is a MatchFunc that only matches SRTP and not SRTCP
pub fn match_srtp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && !is_rtcp(buf)
}

/// match_srtcp is a MatchFunc that only matches SRTCP and not SRTP
pub fn match_srtcp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && is_rtcp(buf)
}

/// random_bytes fills a new buffer of `n` bytes from the thread rng. Used for
/// locally generated SDES master keys.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut rng = rng();
    (0..n).map(|_| rng.random::<u8>()).collect()
}
