use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use shared::error::Result;

use crate::content::MediaContentDescription;
use crate::stream_params::StreamParams;
use crate::transport::PacketOptions;

/// NetworkInterface is handed to the media engine so it can push packets
/// down through the channel. It may be called from any thread.
pub trait NetworkInterface: Send + Sync {
    fn send_packet(&self, packet: BytesMut, options: PacketOptions) -> bool;
    fn send_rtcp(&self, packet: BytesMut, options: PacketOptions) -> bool;
}

/// MediaChannel is the media engine side of a channel: codecs, jitter
/// buffers and devices live behind it. All calls are made on the worker.
pub trait MediaChannel: Send {
    fn set_interface(&mut self, iface: Option<Arc<dyn NetworkInterface>>);

    fn on_packet_received(&mut self, packet: BytesMut, packet_time: Option<Instant>);
    fn on_rtcp_received(&mut self, packet: BytesMut, packet_time: Option<Instant>);
    fn on_ready_to_send(&mut self, ready: bool);

    fn set_send(&mut self, send: bool) -> Result<()>;
    /// Audio playout, or data receive for data channels. Video ignores it.
    fn set_playout(&mut self, playout: bool) -> Result<()> {
        let _ = playout;
        Ok(())
    }

    /// Codec and header-extension parameters of a local description.
    fn set_recv_parameters(&mut self, content: &MediaContentDescription) -> Result<()> {
        let _ = content;
        Ok(())
    }
    /// Codec and header-extension parameters of a remote description.
    fn set_send_parameters(&mut self, content: &MediaContentDescription) -> Result<()> {
        let _ = content;
        Ok(())
    }

    fn add_send_stream(&mut self, stream: &StreamParams) -> Result<()>;
    fn remove_send_stream(&mut self, ssrc: u32) -> Result<()>;
    fn add_recv_stream(&mut self, stream: &StreamParams) -> Result<()>;
    fn remove_recv_stream(&mut self, ssrc: u32) -> Result<()>;
}
