use rtcp::header::PacketType;
use rtp_shared::marshal::Unmarshal;

pub const MIN_RTP_PACKET_LEN: usize = 12;
pub const MIN_RTCP_PACKET_LEN: usize = rtcp::header::HEADER_LENGTH;
/// Upper bound for either packet class, protected or not.
pub const MAX_RTP_PACKET_LEN: usize = 2048;

/// parse_rtp_header reads the fixed header, CSRCs and extensions of an RTP
/// packet.
pub fn parse_rtp_header(mut buf: &[u8]) -> Option<rtp::header::Header> {
    rtp::header::Header::unmarshal(&mut buf).ok()
}

/// get_rtp_seq_num reads the sequence number of an RTP packet.
pub fn get_rtp_seq_num(buf: &[u8]) -> Option<u16> {
    parse_rtp_header(buf).map(|header| header.sequence_number)
}

/// get_rtp_ssrc reads the SSRC of an RTP packet.
pub fn get_rtp_ssrc(buf: &[u8]) -> Option<u32> {
    parse_rtp_header(buf).map(|header| header.ssrc)
}

/// get_rtp_payload_type reads the payload type of an RTP packet.
pub fn get_rtp_payload_type(buf: &[u8]) -> Option<u8> {
    parse_rtp_header(buf).map(|header| header.payload_type)
}

/// get_rtcp_type reads the packet type of the first RTCP packet in a
/// compound packet.
pub fn get_rtcp_type(mut buf: &[u8]) -> Option<PacketType> {
    rtcp::header::Header::unmarshal(&mut buf)
        .ok()
        .map(|header| header.packet_type)
}

/// valid_packet checks the size bounds of an RTP or RTCP packet before it
/// is protected or handed to the media channel.
pub fn valid_packet(rtcp: bool, buf: &[u8]) -> bool {
    let min = if rtcp {
        MIN_RTCP_PACKET_LEN
    } else {
        MIN_RTP_PACKET_LEN
    };
    buf.len() >= min && buf.len() <= MAX_RTP_PACKET_LEN
}
