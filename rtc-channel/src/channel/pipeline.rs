use std::time::Instant;

use bytes::BytesMut;
use log::{debug, error, warn};
use shared::error::Error;

use super::coordinator::ChannelCore;
use super::{ChannelEvent, PendingPacket};
use crate::rtp_utils::{get_rtcp_type, get_rtp_seq_num, get_rtp_ssrc, valid_packet};
use crate::transport::{Component, PacketOptions};

fn packet_kind(rtcp: bool) -> &'static str {
    if rtcp { "rtcp" } else { "rtp" }
}

impl ChannelCore {
    /// send_packet protects and writes one packet. Must run on the worker.
    pub(super) fn send_packet(&mut self, rtcp: bool, data: BytesMut, options: &PacketOptions) -> bool {
        // With rtcp-mux RTCP goes out on the RTP transport.
        let component = if !rtcp || self.rtcp_mux_filter.is_active() {
            Component::Rtp
        } else {
            Component::Rtcp
        };
        let Some(transport) = self.binding.transport(component).cloned() else {
            return false;
        };
        if !transport.writable() {
            return false;
        }

        if !valid_packet(rtcp, &data) {
            error!(
                "dropping outgoing {} {} packet: wrong size={}",
                self.config.content_name,
                packet_kind(rtcp),
                data.len()
            );
            return false;
        }

        let data = if self.srtp_filter.is_active() {
            if rtcp {
                let rtcp_type = get_rtcp_type(&data);
                match self.srtp_filter.protect_rtcp(data) {
                    Ok(data) => data,
                    Err(err) => {
                        error!(
                            "failed to protect {} rtcp packet: type={rtcp_type:?}: {err}",
                            self.config.content_name
                        );
                        return false;
                    }
                }
            } else {
                let seq_num = get_rtp_seq_num(&data).unwrap_or_default();
                let ssrc = get_rtp_ssrc(&data).unwrap_or_default();
                match self.srtp_filter.protect_rtp(data) {
                    Ok(data) => data,
                    Err(err) => {
                        error!(
                            "failed to protect {} rtp packet: seqnum={seq_num}, ssrc={ssrc}: {err}",
                            self.config.content_name
                        );
                        return false;
                    }
                }
            }
        } else if self.secure_required {
            error!(
                "can't send outgoing {} packet when srtp is inactive and crypto is required",
                packet_kind(rtcp)
            );
            debug_assert!(false, "secure transport required but srtp is not active");
            return false;
        } else {
            data
        };

        match transport.send_packet(&data, options) {
            Ok(n) if n == data.len() => true,
            Ok(n) => {
                warn!("short write on {component} transport: {n} of {}", data.len());
                false
            }
            Err(Error::ErrWouldBlock) => {
                warn!("got would-block from {component} transport");
                self.set_ready_to_send(component.is_rtcp(), false);
                false
            }
            Err(err) => {
                warn!("failed to send on {component} transport: {err}");
                false
            }
        }
    }

    /// flush_rtcp_messages sends the queued RTCP packets; queued RTP is
    /// dropped.
    pub(super) fn flush_rtcp_messages(&mut self, pending: Vec<PendingPacket>) {
        for packet in pending.into_iter().filter(|p| p.rtcp) {
            self.send_packet(true, packet.data, &packet.options);
        }
    }

    pub(super) fn packet_is_rtcp(&self, component: Component, data: &[u8]) -> bool {
        component.is_rtcp() || self.rtcp_mux_filter.demux_rtcp(data)
    }

    pub(super) fn on_read_packet(
        &mut self,
        component: Component,
        data: BytesMut,
        packet_time: Option<Instant>,
    ) {
        let rtcp = self.packet_is_rtcp(component, &data);
        self.handle_packet(rtcp, data, packet_time);
    }

    pub(super) fn handle_packet(&mut self, rtcp: bool, data: BytesMut, packet_time: Option<Instant>) {
        if !valid_packet(rtcp, &data) {
            error!(
                "dropping incoming {} {} packet: wrong size={}",
                self.config.content_name,
                packet_kind(rtcp),
                data.len()
            );
            return;
        }

        if !rtcp && !self.bundle_filter.demux_packet(&data) {
            debug!(
                "dropping incoming {} rtp packet: unknown payload type or ssrc, size={}",
                self.config.content_name,
                data.len()
            );
            return;
        }

        if !rtcp && !self.has_received_packet {
            self.has_received_packet = true;
            self.emit(ChannelEvent::FirstPacketReceived);
        }

        let data = if self.srtp_filter.is_active() {
            if rtcp {
                let rtcp_type = get_rtcp_type(&data);
                let size = data.len();
                match self.srtp_filter.unprotect_rtcp(data) {
                    Ok(data) => data,
                    Err(err) => {
                        error!(
                            "failed to unprotect {} rtcp packet: size={size}, type={rtcp_type:?}: {err}",
                            self.config.content_name
                        );
                        return;
                    }
                }
            } else {
                let seq_num = get_rtp_seq_num(&data).unwrap_or_default();
                let ssrc = get_rtp_ssrc(&data).unwrap_or_default();
                let size = data.len();
                match self.srtp_filter.unprotect_rtp(data) {
                    Ok(data) => data,
                    Err(err) => {
                        error!(
                            "failed to unprotect {} rtp packet: size={size}, seqnum={seq_num}, ssrc={ssrc}: {err}",
                            self.config.content_name
                        );
                        return;
                    }
                }
            }
        } else if self.secure_required {
            // Keys may not be installed yet on either side of the handshake.
            debug!(
                "dropping incoming {} packet, srtp is inactive and crypto is required",
                packet_kind(rtcp)
            );
            return;
        } else {
            data
        };

        if rtcp {
            self.media_channel.on_rtcp_received(data, packet_time);
        } else {
            self.media_channel.on_packet_received(data, packet_time);
        }
    }
}
