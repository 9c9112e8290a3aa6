mod coordinator;
mod media_kind;
mod observer;
mod pipeline;
mod streams;

pub use media_kind::MediaKind;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use log::{trace, warn};
use shared::error::Result;
use srtp::protection_profile::ProtectionProfile;
use tokio::sync::mpsc;

use crate::config::ChannelConfig;
use crate::content::{ContentAction, MediaContentDescription};
use crate::media_channel::{MediaChannel, NetworkInterface};
use crate::stream_params::StreamParams;
use crate::transport::{PacketOptions, TransportController};
use crate::worker::Worker;
use coordinator::ChannelCore;
use observer::ChannelNetworkInterface;

/// ChannelEvent is raised by a channel for its owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The first RTP packet arrived. Raised once per channel.
    FirstPacketReceived,
    Writable(bool),
    /// Aggregated RTP and RTCP ready-to-send, raised when it changes.
    ReadyToSend(bool),
    /// Exporting or installing DTLS-SRTP keys failed.
    DtlsSetupFailure { rtcp: bool },
}

pub(crate) struct PendingPacket {
    pub(crate) rtcp: bool,
    pub(crate) data: BytesMut,
    pub(crate) options: PacketOptions,
}

pub(crate) struct ChannelShared {
    worker: Worker,
    core: Mutex<ChannelCore>,
    // Packets handed in off the worker, or while the core was busy.
    pending: Mutex<VecDeque<PendingPacket>>,
}

impl ChannelShared {
    fn with_core<R>(&self, f: impl FnOnce(&mut ChannelCore) -> R) -> Result<R> {
        let mut core = self.core.lock()?;
        Ok(f(&mut core))
    }

    fn has_pending(&self) -> bool {
        self.pending.lock().map(|p| !p.is_empty()).unwrap_or(false)
    }

    /// send_packet sends right away on the worker, otherwise the packet is
    /// queued and true is returned.
    pub(crate) fn send_packet(self: &Arc<Self>, rtcp: bool, data: BytesMut, options: PacketOptions) -> bool {
        if self.worker.is_current() && !self.has_pending() {
            if let Ok(mut core) = self.core.try_lock() {
                return core.send_packet(rtcp, data, &options);
            }
        }
        self.queue_packet(PendingPacket { rtcp, data, options })
    }

    fn queue_packet(self: &Arc<Self>, packet: PendingPacket) -> bool {
        match self.pending.lock() {
            Ok(mut pending) => pending.push_back(packet),
            Err(_) => return false,
        }

        let shared = Arc::downgrade(self);
        self.worker
            .post(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.send_pending_packet();
                }
            })
            .is_ok()
    }

    fn send_pending_packet(&self) {
        let Some(packet) = self.pending.lock().ok().and_then(|mut p| p.pop_front()) else {
            return;
        };
        match self.core.lock() {
            Ok(mut core) => {
                core.send_packet(packet.rtcp, packet.data, &packet.options);
            }
            Err(err) => warn!("dropping queued packet: {err}"),
        }
    }

    /// teardown flushes queued RTCP, detaches media, and releases the
    /// transports.
    fn teardown(&self) {
        let pending: Vec<PendingPacket> = self
            .pending
            .lock()
            .map(|mut p| p.drain(..).collect())
            .unwrap_or_default();
        let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        core.flush_rtcp_messages(pending);
        core.deinit();
    }
}

/// BaseChannel ties a media channel to its RTP and RTCP transports. It
/// negotiates RTCP mux and SRTP, and moves packets between the two sides.
///
/// Every call is executed on the channel's worker; calls made elsewhere
/// block until the worker has run them.
pub struct BaseChannel {
    shared: Arc<ChannelShared>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    content_name: String,
    media_kind: MediaKind,
}

impl BaseChannel {
    /// new creates a channel for `config.content_name` and binds it to the
    /// transports of that name.
    pub fn new(
        worker: Worker,
        controller: Arc<dyn TransportController>,
        media_channel: Box<dyn MediaChannel>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let media_kind = MediaKind::try_from(config.media_type)?;
        let content_name = config.content_name.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new_cyclic(|weak| ChannelShared {
            worker: worker.clone(),
            core: Mutex::new(ChannelCore::new(
                weak.clone(),
                worker.clone(),
                controller,
                media_channel,
                media_kind,
                config,
                events_tx,
            )),
            pending: Mutex::new(VecDeque::new()),
        });

        let channel = BaseChannel {
            shared,
            events: events_rx,
            content_name,
            media_kind,
        };

        let iface: Arc<dyn NetworkInterface> = Arc::new(ChannelNetworkInterface {
            shared: Arc::downgrade(&channel.shared),
        });
        channel.invoke(move |core| core.init(iface))??;

        Ok(channel)
    }

    fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ChannelCore) -> R + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.shared.worker.invoke(move || shared.with_core(f))?
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn worker(&self) -> &Worker {
        &self.shared.worker
    }

    /// set_transport rebinds the channel to the transports of
    /// `transport_name`. Binding the current name again does nothing.
    pub fn set_transport(&self, transport_name: &str) -> Result<()> {
        let transport_name = transport_name.to_owned();
        self.invoke(move |core| core.set_transport(&transport_name))?
    }

    pub fn transport_name(&self) -> Result<String> {
        self.invoke(|core| core.binding.transport_name().to_owned())
    }

    pub fn enable(&self, enable: bool) -> Result<()> {
        self.invoke(move |core| core.enable(enable))
    }

    pub fn enabled(&self) -> Result<bool> {
        self.invoke(|core| core.enabled)
    }

    pub fn set_local_content(
        &self,
        content: &MediaContentDescription,
        action: ContentAction,
    ) -> Result<()> {
        let content = content.clone();
        self.invoke(move |core| core.set_local_content(&content, action))?
    }

    pub fn set_remote_content(
        &self,
        content: &MediaContentDescription,
        action: ContentAction,
    ) -> Result<()> {
        let content = content.clone();
        self.invoke(move |core| core.set_remote_content(&content, action))?
    }

    /// activate_rtcp_mux turns RTCP mux on without negotiation and drops
    /// the RTCP transport.
    pub fn activate_rtcp_mux(&self) -> Result<()> {
        self.invoke(|core| core.activate_rtcp_mux())
    }

    pub fn add_send_stream(&self, stream: &StreamParams) -> Result<()> {
        let stream = stream.clone();
        self.invoke(move |core| core.add_send_stream(&stream))?
    }

    pub fn remove_send_stream(&self, ssrc: u32) -> Result<()> {
        self.invoke(move |core| core.remove_send_stream(ssrc))?
    }

    pub fn add_recv_stream(&self, stream: &StreamParams) -> Result<()> {
        let stream = stream.clone();
        self.invoke(move |core| core.add_recv_stream(&stream))?
    }

    pub fn remove_recv_stream(&self, ssrc: u32) -> Result<()> {
        self.invoke(move |core| core.remove_recv_stream(ssrc))?
    }

    pub fn local_streams(&self) -> Result<Vec<StreamParams>> {
        self.invoke(|core| core.local_streams.clone())
    }

    pub fn remote_streams(&self) -> Result<Vec<StreamParams>> {
        self.invoke(|core| core.remote_streams.clone())
    }

    pub fn writable(&self) -> Result<bool> {
        self.invoke(|core| core.binding.state().writable)
    }

    pub fn was_ever_writable(&self) -> Result<bool> {
        self.invoke(|core| core.binding.state().was_ever_writable)
    }

    pub fn is_ready_to_send(&self) -> Result<bool> {
        self.invoke(|core| core.is_ready_to_send())
    }

    pub fn is_ready_to_receive(&self) -> Result<bool> {
        self.invoke(|core| core.is_ready_to_receive())
    }

    /// secure tells whether SRTP keys are installed.
    pub fn secure(&self) -> Result<bool> {
        self.invoke(|core| core.srtp_filter.is_active())
    }

    pub fn secure_required(&self) -> Result<bool> {
        self.invoke(|core| core.secure_required)
    }

    pub fn srtp_profile(&self) -> Result<Option<ProtectionProfile>> {
        self.invoke(|core| core.srtp_filter.profile())
    }

    pub fn rtcp_mux_active(&self) -> Result<bool> {
        self.invoke(|core| core.rtcp_mux_filter.is_active())
    }

    pub fn has_rtcp_transport(&self) -> Result<bool> {
        self.invoke(|core| core.binding.has_rtcp_transport())
    }

    /// send_packet sends an RTP packet. Off the worker the packet is queued
    /// and true is returned.
    pub fn send_packet(&self, packet: BytesMut, options: PacketOptions) -> bool {
        self.shared.send_packet(false, packet, options)
    }

    pub fn send_rtcp(&self, packet: BytesMut, options: PacketOptions) -> bool {
        self.shared.send_packet(true, packet, options)
    }

    /// network_interface is the handle the media channel sends through.
    pub fn network_interface(&self) -> Arc<dyn NetworkInterface> {
        Arc::new(ChannelNetworkInterface {
            shared: Arc::downgrade(&self.shared),
        })
    }

    pub fn poll_event(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }
}

impl fmt::Debug for BaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseChannel")
            .field("content_name", &self.content_name)
            .field("media_kind", &self.media_kind)
            .finish()
    }
}

impl Drop for BaseChannel {
    fn drop(&mut self) {
        let shared = Arc::clone(&self.shared);
        if let Err(err) = self.shared.worker.invoke(move || shared.teardown()) {
            warn!(
                "tearing down channel {} off the worker: {err}",
                self.content_name
            );
            self.shared.teardown();
        }
        trace!("channel {} dropped", self.content_name);
    }
}
