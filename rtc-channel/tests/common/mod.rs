#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use bytes::BytesMut;
use shared::crypto::{DTLS_SRTP_EXPORTER_LABEL, KeyingMaterialExporter};
use shared::error::{Error, Result};
use srtp::protection_profile::ProtectionProfile;

use rtc_channel::channel::{BaseChannel, ChannelEvent};
use rtc_channel::config::ChannelConfig;
use rtc_channel::content::{Codec, MediaContentDescription, MediaType};
use rtc_channel::media_channel::{MediaChannel, NetworkInterface};
use rtc_channel::stream_params::StreamParams;
use rtc_channel::transport::*;
use rtc_channel::worker::Worker;

pub fn init_log() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// settle lets every task posted so far, and the tasks they post, run.
pub fn settle(worker: &Worker) {
    for _ in 0..4 {
        worker.invoke(|| ()).unwrap();
    }
}

pub fn drain_events(channel: &mut BaseChannel) -> Vec<ChannelEvent> {
    let mut events = vec![];
    while let Some(event) = channel.poll_event() {
        events.push(event);
    }
    events
}

/// Payload type of every packet built by rtp_packet.
pub const TEST_PAYLOAD_TYPE: u8 = 96;

pub fn rtp_packet(seq: u16, ssrc: u32) -> BytesMut {
    let mut pkt = BytesMut::from(&[0x80u8, TEST_PAYLOAD_TYPE][..]);
    pkt.extend_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(&[0, 0, 0, 1]);
    pkt.extend_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    pkt
}

/// rtcp_packet is an empty receiver report.
pub fn rtcp_packet(ssrc: u32) -> BytesMut {
    let mut pkt = BytesMut::from(&[0x80u8, 201, 0x00, 0x01][..]);
    pkt.extend_from_slice(&ssrc.to_be_bytes());
    pkt
}

/// audio_content negotiates TEST_PAYLOAD_TYPE, so packets from rtp_packet
/// pass the bundle filter once it is applied locally.
pub fn audio_content(rtcp_mux: bool) -> MediaContentDescription {
    MediaContentDescription {
        codecs: vec![Codec::new(TEST_PAYLOAD_TYPE, "opus", 48000)],
        rtcp_mux,
        ..MediaContentDescription::new(MediaType::Audio)
    }
}

#[derive(Default)]
pub struct FakeTransportState {
    pub writable: bool,
    /// Overrides writability as the ready-to-send signal when set.
    pub ready_to_send: Option<bool>,
    pub dtls_active: bool,
    pub dtls_state: DtlsTransportState,
    pub role: Option<DtlsRole>,
    pub selected_profile: Option<ProtectionProfile>,
    pub offered_profiles: Vec<ProtectionProfile>,
    pub would_block: bool,
    pub fail_export: bool,
    pub exports: usize,
    pub sent: Vec<Vec<u8>>,
}

pub struct FakeTransport {
    name: String,
    component: Component,
    observers: TransportObservers,
    state: Mutex<FakeTransportState>,
    peer: Mutex<Option<Weak<FakeTransport>>>,
}

impl FakeTransport {
    pub fn new(name: &str, component: Component) -> Self {
        FakeTransport {
            name: name.to_owned(),
            component,
            observers: TransportObservers::new(),
            state: Mutex::new(FakeTransportState::default()),
            peer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeTransportState> {
        self.state.lock().unwrap()
    }

    /// connect delivers every packet sent on one side to the other.
    pub fn connect(a: &Arc<FakeTransport>, b: &Arc<FakeTransport>) {
        *a.peer.lock().unwrap() = Some(Arc::downgrade(b));
        *b.peer.lock().unwrap() = Some(Arc::downgrade(a));
    }

    pub fn set_writable(&self, writable: bool) {
        self.state().writable = writable;
        self.observers.notify(|o| o.on_writable_state());
    }

    /// set_dtls makes the transport DTLS-active with a finished handshake.
    pub fn set_dtls(&self, role: Option<DtlsRole>) {
        let mut state = self.state();
        state.dtls_active = true;
        state.dtls_state = DtlsTransportState::Connected;
        state.role = role;
        state.selected_profile = Some(ProtectionProfile::Aes128CmHmacSha1_80);
    }

    pub fn set_dtls_state(&self, dtls_state: DtlsTransportState) {
        self.state().dtls_state = dtls_state;
        self.observers.notify(|o| o.on_dtls_state(dtls_state));
    }

    pub fn signal_ready_to_send(&self) {
        self.observers.notify(|o| o.on_ready_to_send());
    }

    pub fn receive(&self, data: &[u8]) {
        self.observers.notify(|o| o.on_read_packet(data, Some(Instant::now())));
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    pub fn exports(&self) -> usize {
        self.state().exports
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl KeyingMaterialExporter for FakeTransport {
    fn export_keying_material(&self, label: &str, _context: &[u8], length: usize) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.exports += 1;
        if state.fail_export || label != DTLS_SRTP_EXPORTER_LABEL {
            return Err(Error::ErrExporterWrongLabel);
        }
        // Both ends of a fake handshake agree on the same material.
        Ok((0..length).map(|i| (i as u8).wrapping_mul(7)).collect())
    }
}

impl DtlsTransportInternal for FakeTransport {
    fn transport_name(&self) -> &str {
        &self.name
    }

    fn component(&self) -> Component {
        self.component
    }

    fn writable(&self) -> bool {
        self.state().writable
    }

    fn ready_to_send(&self) -> bool {
        let state = self.state();
        state.ready_to_send.unwrap_or(state.writable)
    }

    fn is_dtls_active(&self) -> bool {
        self.state().dtls_active
    }

    fn dtls_state(&self) -> DtlsTransportState {
        self.state().dtls_state
    }

    fn dtls_role(&self) -> Option<DtlsRole> {
        self.state().role
    }

    fn selected_srtp_protection_profile(&self) -> Option<ProtectionProfile> {
        self.state().selected_profile
    }

    fn set_srtp_protection_profiles(&self, profiles: &[ProtectionProfile]) -> Result<()> {
        self.state().offered_profiles = profiles.to_vec();
        Ok(())
    }

    fn send_packet(&self, data: &[u8], _options: &PacketOptions) -> Result<usize> {
        {
            let mut state = self.state();
            if state.would_block {
                return Err(Error::ErrWouldBlock);
            }
            state.sent.push(data.to_vec());
        }

        let peer = self.peer.lock().unwrap().as_ref().and_then(Weak::upgrade);
        if let Some(peer) = peer {
            peer.receive(data);
        }
        Ok(data.len())
    }

    fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> TransportSubscription {
        self.observers.subscribe(observer)
    }
}

#[derive(Default)]
pub struct FakeController {
    transports: Mutex<HashMap<(String, Component), Arc<FakeTransport>>>,
    failing: Mutex<HashSet<String>>,
    dtls_role: Mutex<Option<DtlsRole>>,
    created: Mutex<Vec<(String, Component)>>,
    destroyed: Mutex<Vec<(String, Component)>>,
}

impl FakeController {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeController::default())
    }

    /// with_dtls makes every transport created from now on DTLS-active.
    pub fn with_dtls(role: DtlsRole) -> Arc<Self> {
        let controller = FakeController::default();
        *controller.dtls_role.lock().unwrap() = Some(role);
        Arc::new(controller)
    }

    /// precreate makes a transport exist before any channel asks for it,
    /// like a bundle transport shared with another channel.
    pub fn precreate(&self, transport_name: &str, component: Component) -> Arc<FakeTransport> {
        let role = *self.dtls_role.lock().unwrap();
        let transport = Arc::new(FakeTransport::new(transport_name, component));
        if let Some(role) = role {
            transport.set_dtls(Some(role));
        }
        self.transports
            .lock()
            .unwrap()
            .insert((transport_name.to_owned(), component), Arc::clone(&transport));
        transport
    }

    pub fn fail_create(&self, transport_name: &str) {
        self.failing.lock().unwrap().insert(transport_name.to_owned());
    }

    pub fn transport(&self, transport_name: &str, component: Component) -> Option<Arc<FakeTransport>> {
        self.transports
            .lock()
            .unwrap()
            .get(&(transport_name.to_owned(), component))
            .cloned()
    }

    pub fn rtp(&self, transport_name: &str) -> Arc<FakeTransport> {
        self.transport(transport_name, Component::Rtp).unwrap()
    }

    pub fn rtcp(&self, transport_name: &str) -> Arc<FakeTransport> {
        self.transport(transport_name, Component::Rtcp).unwrap()
    }

    pub fn created(&self) -> Vec<(String, Component)> {
        self.created.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<(String, Component)> {
        self.destroyed.lock().unwrap().clone()
    }
}

impl TransportController for FakeController {
    fn create_transport(
        &self,
        transport_name: &str,
        component: Component,
    ) -> Result<Arc<dyn DtlsTransportInternal>> {
        if self.failing.lock().unwrap().contains(transport_name) {
            return Err(Error::ErrTransportCreateFailed(format!(
                "{transport_name} {component}"
            )));
        }

        let role = *self.dtls_role.lock().unwrap();
        let transport = self
            .transports
            .lock()
            .unwrap()
            .entry((transport_name.to_owned(), component))
            .or_insert_with(|| {
                let transport = FakeTransport::new(transport_name, component);
                if let Some(role) = role {
                    transport.set_dtls(Some(role));
                }
                Arc::new(transport)
            })
            .clone();
        self.created
            .lock()
            .unwrap()
            .push((transport_name.to_owned(), component));

        let transport: Arc<dyn DtlsTransportInternal> = transport;
        Ok(transport)
    }

    fn destroy_transport(&self, transport_name: &str, component: Component) {
        let key = (transport_name.to_owned(), component);
        if let Some(transport) = self.transports.lock().unwrap().remove(&key) {
            // The channel must have unsubscribed already.
            assert_eq!(transport.observer_count(), 0, "destroyed while observed");
        }
        self.destroyed.lock().unwrap().push(key);
    }
}

#[derive(Default)]
pub struct MediaRecord {
    pub rtp: Vec<BytesMut>,
    pub rtcp: Vec<BytesMut>,
    pub ready_to_send: Vec<bool>,
    pub send: Option<bool>,
    pub playout: Option<bool>,
    pub send_streams: Vec<u32>,
    pub recv_streams: Vec<u32>,
    pub has_interface: bool,
    pub fail_add_send_stream: bool,
    /// RTCP sent back through the interface for every RTP packet received.
    pub reply_rtcp: Option<BytesMut>,
    pub reply_results: Vec<bool>,
}

#[derive(Default)]
pub struct FakeMediaChannel {
    record: Arc<Mutex<MediaRecord>>,
    iface: Option<Arc<dyn NetworkInterface>>,
}

impl FakeMediaChannel {
    pub fn new() -> (Box<Self>, Arc<Mutex<MediaRecord>>) {
        let media = FakeMediaChannel::default();
        let record = Arc::clone(&media.record);
        (Box::new(media), record)
    }
}

impl MediaChannel for FakeMediaChannel {
    fn set_interface(&mut self, iface: Option<Arc<dyn NetworkInterface>>) {
        self.record.lock().unwrap().has_interface = iface.is_some();
        self.iface = iface;
    }

    fn on_packet_received(&mut self, packet: BytesMut, _packet_time: Option<Instant>) {
        let reply = {
            let mut record = self.record.lock().unwrap();
            record.rtp.push(packet);
            record.reply_rtcp.clone()
        };
        if let (Some(reply), Some(iface)) = (reply, self.iface.as_ref()) {
            let ok = iface.send_rtcp(reply, PacketOptions::default());
            self.record.lock().unwrap().reply_results.push(ok);
        }
    }

    fn on_rtcp_received(&mut self, packet: BytesMut, _packet_time: Option<Instant>) {
        self.record.lock().unwrap().rtcp.push(packet);
    }

    fn on_ready_to_send(&mut self, ready: bool) {
        self.record.lock().unwrap().ready_to_send.push(ready);
    }

    fn set_send(&mut self, send: bool) -> Result<()> {
        self.record.lock().unwrap().send = Some(send);
        Ok(())
    }

    fn set_playout(&mut self, playout: bool) -> Result<()> {
        self.record.lock().unwrap().playout = Some(playout);
        Ok(())
    }

    fn add_send_stream(&mut self, stream: &StreamParams) -> Result<()> {
        let mut record = self.record.lock().unwrap();
        if record.fail_add_send_stream {
            return Err(Error::Other("rejected".to_owned()));
        }
        record.send_streams.push(stream.first_ssrc());
        Ok(())
    }

    fn remove_send_stream(&mut self, ssrc: u32) -> Result<()> {
        self.record.lock().unwrap().send_streams.retain(|s| *s != ssrc);
        Ok(())
    }

    fn add_recv_stream(&mut self, stream: &StreamParams) -> Result<()> {
        self.record.lock().unwrap().recv_streams.push(stream.first_ssrc());
        Ok(())
    }

    fn remove_recv_stream(&mut self, ssrc: u32) -> Result<()> {
        self.record.lock().unwrap().recv_streams.retain(|s| *s != ssrc);
        Ok(())
    }
}

pub fn audio_config(content_name: &str) -> ChannelConfig {
    ChannelConfig::new(content_name, MediaType::Audio)
}

pub fn new_channel(
    worker: &Worker,
    controller: &Arc<FakeController>,
    config: ChannelConfig,
) -> (BaseChannel, Arc<Mutex<MediaRecord>>) {
    let (media, record) = FakeMediaChannel::new();
    let controller: Arc<dyn TransportController> = Arc::clone(controller) as Arc<dyn TransportController>;
    let channel = BaseChannel::new(worker.clone(), controller, media, config).unwrap();
    (channel, record)
}
