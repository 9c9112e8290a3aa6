use std::sync::{Arc, Weak};

use log::{debug, error, info, trace, warn};
use shared::error::{Error, Result};
use tokio::sync::mpsc;

use super::ChannelEvent;
use super::ChannelShared;
use super::media_kind::MediaKind;
use super::observer::ChannelTransportObserver;
use crate::bundle_filter::BundleFilter;
use crate::config::ChannelConfig;
use crate::content::{ContentAction, ContentSource, MediaContentDescription, MediaContentDirection};
use crate::crypto_params::CryptoParams;
use crate::dtls_srtp::setup_dtls_srtp;
use crate::media_channel::{MediaChannel, NetworkInterface};
use crate::rtcp_mux_filter::RtcpMuxFilter;
use crate::srtp_filter::SrtpFilter;
use crate::stream_params::StreamParams;
use crate::transport::{
    Component, DtlsTransportInternal, DtlsTransportState, TransportController, TransportObserver,
};
use crate::transport_binding::TransportBinding;
use crate::worker::Worker;

/// ChannelCore is the state of one channel. It lives behind the channel
/// mutex and is only ever locked on the worker.
pub(crate) struct ChannelCore {
    pub(super) config: ChannelConfig,
    pub(super) media_kind: MediaKind,
    pub(super) media_channel: Box<dyn MediaChannel>,
    pub(super) binding: TransportBinding,
    pub(super) srtp_filter: SrtpFilter,
    pub(super) rtcp_mux_filter: RtcpMuxFilter,
    pub(super) bundle_filter: BundleFilter,

    /// Cleared once RTCP mux is active; no RTCP transport is created after.
    pub(super) rtcp_enabled: bool,
    pub(super) enabled: bool,
    pub(super) secure_required: bool,
    pub(super) has_received_packet: bool,
    pub(super) local_direction: MediaContentDirection,
    pub(super) remote_direction: MediaContentDirection,
    pub(super) local_streams: Vec<StreamParams>,
    pub(super) remote_streams: Vec<StreamParams>,

    events: mpsc::UnboundedSender<ChannelEvent>,
    last_ready_to_send: Option<bool>,
    worker: Worker,
    shared: Weak<ChannelShared>,
}

impl ChannelCore {
    pub(super) fn new(
        shared: Weak<ChannelShared>,
        worker: Worker,
        controller: Arc<dyn TransportController>,
        media_channel: Box<dyn MediaChannel>,
        media_kind: MediaKind,
        config: ChannelConfig,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Self {
        let mut rtcp_mux_filter = RtcpMuxFilter::new();
        if config.rtcp_mux_required {
            rtcp_mux_filter.set_active();
        }

        ChannelCore {
            srtp_filter: SrtpFilter::new(config.srtp_replay_window, config.srtcp_replay_window),
            rtcp_mux_filter,
            bundle_filter: BundleFilter::new(),
            rtcp_enabled: !config.rtcp_mux_required,
            config,
            media_kind,
            media_channel,
            binding: TransportBinding::new(controller),
            enabled: false,
            secure_required: false,
            has_received_packet: false,
            local_direction: MediaContentDirection::Inactive,
            remote_direction: MediaContentDirection::Inactive,
            local_streams: vec![],
            remote_streams: vec![],
            events,
            last_ready_to_send: None,
            worker,
            shared,
        }
    }

    pub(super) fn init(&mut self, iface: Arc<dyn NetworkInterface>) -> Result<()> {
        let content_name = self.config.content_name.clone();
        self.set_transport(&content_name)?;
        self.media_channel.set_interface(Some(iface));
        debug!("{} channel {} initialized", self.media_kind, content_name);
        Ok(())
    }

    /// deinit detaches the media channel and releases every transport.
    pub(super) fn deinit(&mut self) {
        self.media_channel.set_interface(None);
        self.binding.release(Component::Rtp);
        self.binding.release(Component::Rtcp);
        debug!("{} channel {} destroyed", self.media_kind, self.config.content_name);
    }

    pub(super) fn emit(&self, event: ChannelEvent) {
        trace!("channel {} event {:?}", self.config.content_name, event);
        let _ = self.events.send(event);
    }

    // Transports

    pub(super) fn set_transport(&mut self, transport_name: &str) -> Result<()> {
        if transport_name == self.binding.transport_name() {
            return Ok(());
        }

        // Keys are tied to the DTLS session of the old transport.
        if self.should_setup_dtls() {
            self.binding.state_mut().writable = false;
            self.srtp_filter.reset_params();
        }

        if self.rtcp_enabled {
            self.bind_transport(transport_name, Component::Rtcp)?;
        }
        let rtp = self.bind_transport(transport_name, Component::Rtp)?;

        self.update_writable_state();
        self.set_ready_to_send(false, rtp);
        if self.rtcp_enabled {
            let rtcp = self
                .binding
                .rtcp_transport()
                .is_some_and(|transport| transport.ready_to_send());
            self.set_ready_to_send(true, rtcp);
        }

        self.binding.set_transport_name(transport_name);
        info!(
            "{} channel {} bound to transport {}",
            self.media_kind, self.config.content_name, transport_name
        );
        Ok(())
    }

    /// bind_transport replaces the transport of `component` and pushes the
    /// DTLS-SRTP profile preferences to it. Returns whether it is ready to
    /// send.
    fn bind_transport(&mut self, transport_name: &str, component: Component) -> Result<bool> {
        let observer: Arc<dyn TransportObserver> = Arc::new(ChannelTransportObserver::new(
            self.worker.clone(),
            Weak::clone(&self.shared),
            transport_name,
            component,
        ));
        let transport = self.binding.create(transport_name, component, observer)?;

        let profiles = self.config.srtp_protection_profiles(component.is_rtcp());
        transport.set_srtp_protection_profiles(&profiles)?;

        Ok(transport.ready_to_send())
    }

    pub(super) fn release_rtcp_transport(&mut self, update_writable: bool) {
        if !self.binding.has_rtcp_transport() {
            return;
        }
        self.binding.release(Component::Rtcp);
        if update_writable {
            self.update_writable_state();
            self.set_ready_to_send(true, false);
        }
    }

    /// should_setup_dtls tells whether keys come from DTLS-SRTP rather than
    /// SDES.
    pub(super) fn should_setup_dtls(&self) -> bool {
        self.binding
            .rtp_transport()
            .is_some_and(|transport| transport.is_dtls_active())
    }

    // Writability

    pub(super) fn update_writable_state(&mut self) {
        if self.binding.transports_writable() {
            self.channel_writable();
        } else {
            self.channel_not_writable();
        }
    }

    pub(super) fn channel_writable(&mut self) {
        if self.binding.state().writable {
            return;
        }

        info!(
            "channel {} writable ({}){}",
            self.config.content_name,
            self.binding.transport_name(),
            if self.binding.state().was_ever_writable {
                ""
            } else {
                " for the first time"
            }
        );

        self.binding.state_mut().was_ever_writable = true;
        self.maybe_setup_dtls_srtp();
        self.binding.state_mut().writable = true;
        self.change_state();
        self.emit(ChannelEvent::Writable(true));
    }

    pub(super) fn channel_not_writable(&mut self) {
        if !self.binding.state().writable {
            return;
        }

        info!(
            "channel {} not writable ({})",
            self.config.content_name,
            self.binding.transport_name()
        );
        self.binding.state_mut().writable = false;
        self.change_state();
        self.emit(ChannelEvent::Writable(false));
    }

    /// maybe_setup_dtls_srtp installs DTLS-SRTP keys for every sub-channel
    /// whose transport has finished its handshake. Sub-channels that already
    /// hold keys are skipped.
    pub(super) fn maybe_setup_dtls_srtp(&mut self) {
        if !self.should_setup_dtls() {
            return;
        }

        let Some(rtp) = self.binding.rtp_transport().cloned() else {
            return;
        };
        if !self.setup_dtls_srtp_on(rtp.as_ref(), false) {
            return;
        }

        if let Some(rtcp) = self.binding.rtcp_transport().cloned() {
            self.setup_dtls_srtp_on(rtcp.as_ref(), true);
        }
    }

    fn setup_dtls_srtp_on(&mut self, transport: &dyn DtlsTransportInternal, rtcp: bool) -> bool {
        match setup_dtls_srtp(transport, rtcp, &mut self.srtp_filter) {
            Ok(()) => true,
            // Retried on the dtls state change to connected.
            Err(Error::ErrDtlsNotConnected) => false,
            Err(err) => {
                error!(
                    "failed to setup dtls-srtp on {} of {}: {err}",
                    if rtcp { "rtcp" } else { "rtp" },
                    self.config.content_name
                );
                self.emit(ChannelEvent::DtlsSetupFailure { rtcp });
                false
            }
        }
    }

    pub(super) fn set_ready_to_send(&mut self, rtcp: bool, ready: bool) {
        let has_rtcp_transport = self.binding.has_rtcp_transport();
        let ready = self
            .binding
            .state_mut()
            .set_ready_to_send(rtcp, ready, has_rtcp_transport);

        self.media_channel.on_ready_to_send(ready);
        if self.last_ready_to_send != Some(ready) {
            self.last_ready_to_send = Some(ready);
            self.emit(ChannelEvent::ReadyToSend(ready));
        }
    }

    // Transport notifications

    pub(super) fn on_writable_state(&mut self) {
        self.update_writable_state();
    }

    pub(super) fn on_ready_to_send(&mut self, component: Component) {
        self.set_ready_to_send(component.is_rtcp(), true);
    }

    pub(super) fn on_dtls_state(&mut self, state: DtlsTransportState) {
        if !self.should_setup_dtls() {
            return;
        }

        if state == DtlsTransportState::Connected {
            // A transport that turned writable before its handshake finished
            // gets its keys now.
            if self.binding.state().writable {
                self.maybe_setup_dtls_srtp();
                self.change_state();
            }
        } else {
            debug!(
                "dtls state of {} is {state}, resetting srtp",
                self.config.content_name
            );
            self.srtp_filter.reset_params();
            self.change_state();
        }
    }

    // Media state

    pub(super) fn enable(&mut self, enable: bool) {
        if self.enabled == enable {
            return;
        }
        info!(
            "{} channel {} {}",
            self.media_kind,
            self.config.content_name,
            if enable { "enabled" } else { "disabled" }
        );
        self.enabled = enable;
        self.change_state();
    }

    pub(super) fn is_ready_to_receive(&self) -> bool {
        self.enabled && self.local_direction.has_recv()
    }

    pub(super) fn is_ready_to_send(&self) -> bool {
        self.enabled
            && self.remote_direction.has_recv()
            && self.local_direction.has_send()
            && self.binding.state().was_ever_writable
            && (self.srtp_filter.is_active() || !self.should_setup_dtls())
    }

    pub(super) fn change_state(&mut self) {
        let recv = self.is_ready_to_receive();
        let send = self.is_ready_to_send();
        self.media_kind
            .change_state(self.media_channel.as_mut(), recv, send);
        debug!(
            "changed {} state of {}: recv={recv} send={send}",
            self.media_kind, self.config.content_name
        );
    }

    // Negotiation

    pub(super) fn set_local_content(
        &mut self,
        content: &MediaContentDescription,
        action: ContentAction,
    ) -> Result<()> {
        self.media_kind.check_content(content)?;
        info!(
            "setting local {} description ({action}) on {}",
            self.media_kind, self.config.content_name
        );

        self.set_rtp_transport_parameters(content, action, ContentSource::Local)?;
        if action != ContentAction::Update {
            for codec in &content.codecs {
                self.bundle_filter.add_payload_type(codec.payload_type);
            }
        }
        self.media_channel
            .set_recv_parameters(content)
            .map_err(|err| {
                warn!("failed to set recv parameters: {err}");
                Error::ErrSetRecvParameters(self.media_kind.to_string())
            })?;
        self.update_local_streams(&content.streams, action)?;

        self.local_direction = content.direction;
        self.change_state();
        Ok(())
    }

    pub(super) fn set_remote_content(
        &mut self,
        content: &MediaContentDescription,
        action: ContentAction,
    ) -> Result<()> {
        self.media_kind.check_content(content)?;
        info!(
            "setting remote {} description ({action}) on {}",
            self.media_kind, self.config.content_name
        );

        self.set_rtp_transport_parameters(content, action, ContentSource::Remote)?;
        self.media_channel
            .set_send_parameters(content)
            .map_err(|err| {
                warn!("failed to set send parameters: {err}");
                Error::ErrSetSendParameters(self.media_kind.to_string())
            })?;
        self.update_remote_streams(&content.streams, action)?;

        self.remote_direction = content.direction;
        self.change_state();
        Ok(())
    }

    fn set_rtp_transport_parameters(
        &mut self,
        content: &MediaContentDescription,
        action: ContentAction,
        source: ContentSource,
    ) -> Result<()> {
        if action == ContentAction::Update {
            return Ok(());
        }

        if source == ContentSource::Local {
            self.secure_required = content.crypto_required;
        }
        self.set_srtp(&content.cryptos, action, source)?;
        self.set_rtcp_mux(content.rtcp_mux, action, source)
    }

    fn set_srtp(
        &mut self,
        cryptos: &[CryptoParams],
        action: ContentAction,
        source: ContentSource,
    ) -> Result<()> {
        if self.should_setup_dtls() {
            if !cryptos.is_empty() {
                return Err(Error::ErrCryptosWithDtls);
            }
            // Keys come from the handshake.
            return Ok(());
        }

        match action {
            ContentAction::Offer => self.srtp_filter.set_offer(cryptos, source),
            ContentAction::ProvisionalAnswer => {
                self.srtp_filter.set_provisional_answer(cryptos, source)
            }
            ContentAction::Answer => self.srtp_filter.set_answer(cryptos, source),
            ContentAction::Update => Ok(()),
        }
    }

    fn set_rtcp_mux(&mut self, enable: bool, action: ContentAction, source: ContentSource) -> Result<()> {
        match action {
            ContentAction::Offer => self.rtcp_mux_filter.set_offer(enable, source)?,
            // The RTCP transport is only torn down on a final answer.
            ContentAction::ProvisionalAnswer => {
                self.rtcp_mux_filter.set_provisional_answer(enable, source)?
            }
            ContentAction::Answer => {
                self.rtcp_mux_filter.set_answer(enable, source)?;
                if self.rtcp_mux_filter.is_fully_active() && self.binding.has_rtcp_transport() {
                    info!(
                        "enabling rtcp-mux for {}, destroying rtcp transport",
                        self.config.content_name
                    );
                    self.release_rtcp_transport(true);
                }
                if self.rtcp_mux_filter.is_fully_active() {
                    self.rtcp_enabled = false;
                }
            }
            ContentAction::Update => {}
        }

        if self.rtcp_mux_filter.is_active()
            && self
                .binding
                .rtp_transport()
                .is_some_and(|transport| transport.writable())
        {
            self.channel_writable();
        }
        Ok(())
    }

    pub(super) fn activate_rtcp_mux(&mut self) {
        if self.rtcp_mux_filter.is_active() {
            return;
        }
        info!("rtcp-mux activated on {}", self.config.content_name);
        self.rtcp_mux_filter.set_active();
        self.release_rtcp_transport(true);
        self.rtcp_enabled = false;
    }
}
