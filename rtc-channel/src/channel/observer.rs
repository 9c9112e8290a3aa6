use std::sync::Weak;
use std::time::Instant;

use bytes::BytesMut;
use log::trace;

use super::ChannelShared;
use super::coordinator::ChannelCore;
use crate::media_channel::NetworkInterface;
use crate::transport::{Component, DtlsTransportState, PacketOptions, TransportObserver};
use crate::worker::Worker;

/// ChannelTransportObserver forwards the notifications of one bound
/// transport to the worker. Notifications from a transport the channel
/// no longer holds are dropped there.
pub(crate) struct ChannelTransportObserver {
    worker: Worker,
    shared: Weak<ChannelShared>,
    transport_name: String,
    component: Component,
}

impl ChannelTransportObserver {
    pub(crate) fn new(
        worker: Worker,
        shared: Weak<ChannelShared>,
        transport_name: &str,
        component: Component,
    ) -> Self {
        ChannelTransportObserver {
            worker,
            shared,
            transport_name: transport_name.to_owned(),
            component,
        }
    }

    fn post(&self, f: impl FnOnce(&mut ChannelCore, Component) + Send + 'static) {
        let shared = Weak::clone(&self.shared);
        let transport_name = self.transport_name.clone();
        let component = self.component;

        let result = self.worker.post(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let Ok(mut core) = shared.core.lock() else {
                return;
            };
            if !core.binding.is_bound_to(&transport_name, component) {
                trace!("ignoring notification from released {component} transport {transport_name}");
                return;
            }
            f(&mut core, component);
        });
        if result.is_err() {
            trace!("worker stopped, dropping transport notification");
        }
    }
}

impl TransportObserver for ChannelTransportObserver {
    fn on_writable_state(&self) {
        self.post(|core, _| core.on_writable_state());
    }

    fn on_ready_to_send(&self) {
        self.post(|core, component| core.on_ready_to_send(component));
    }

    fn on_read_packet(&self, data: &[u8], packet_time: Option<Instant>) {
        let data = BytesMut::from(data);
        self.post(move |core, component| core.on_read_packet(component, data, packet_time));
    }

    fn on_dtls_state(&self, state: DtlsTransportState) {
        self.post(move |core, _| core.on_dtls_state(state));
    }
}

/// ChannelNetworkInterface is the NetworkInterface a channel hands to its
/// media channel.
pub(crate) struct ChannelNetworkInterface {
    pub(crate) shared: Weak<ChannelShared>,
}

impl NetworkInterface for ChannelNetworkInterface {
    fn send_packet(&self, packet: BytesMut, options: PacketOptions) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.send_packet(false, packet, options))
    }

    fn send_rtcp(&self, packet: BytesMut, options: PacketOptions) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.send_packet(true, packet, options))
    }
}
