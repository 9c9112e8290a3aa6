use std::sync::Arc;

use log::{debug, info, warn};
use shared::error::Result;

use crate::transport::{
    Component, DtlsTransportInternal, TransportController, TransportObserver,
    TransportSubscription,
};

/// WritableState holds every writability/readiness flag of a channel.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct WritableState {
    /// The channel went through its writable entry action.
    pub writable: bool,
    pub was_ever_writable: bool,
    pub rtp_ready_to_send: bool,
    pub rtcp_ready_to_send: bool,
}

impl WritableState {
    /// ready_to_send is the single readiness value reported to media.
    pub fn ready_to_send(&self, has_rtcp_transport: bool) -> bool {
        self.rtp_ready_to_send && (self.rtcp_ready_to_send || !has_rtcp_transport)
    }

    /// set_ready_to_send updates one side and returns the new aggregate.
    pub fn set_ready_to_send(&mut self, rtcp: bool, ready: bool, has_rtcp_transport: bool) -> bool {
        if rtcp {
            self.rtcp_ready_to_send = ready;
        } else {
            self.rtp_ready_to_send = ready;
        }
        self.ready_to_send(has_rtcp_transport)
    }
}

/// aggregate_writable is true iff RTP is writable and RTCP, when it has its
/// own transport, is writable too.
pub fn aggregate_writable(rtp_writable: Option<bool>, rtcp_writable: Option<bool>) -> bool {
    rtp_writable == Some(true) && rtcp_writable.unwrap_or(true)
}

struct BoundTransport {
    transport: Arc<dyn DtlsTransportInternal>,
    // Dropped before the controller destroys the transport.
    subscription: Option<TransportSubscription>,
}

/// TransportBinding holds the RTP and optional RTCP transport of a channel.
pub struct TransportBinding {
    controller: Arc<dyn TransportController>,
    transport_name: String,
    rtp: Option<BoundTransport>,
    rtcp: Option<BoundTransport>,
    state: WritableState,
}

impl TransportBinding {
    pub fn new(controller: Arc<dyn TransportController>) -> Self {
        TransportBinding {
            controller,
            transport_name: String::new(),
            rtp: None,
            rtcp: None,
            state: WritableState::default(),
        }
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    pub fn set_transport_name(&mut self, transport_name: &str) {
        self.transport_name = transport_name.to_owned();
    }

    pub fn state(&self) -> &WritableState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WritableState {
        &mut self.state
    }

    pub fn transport(&self, component: Component) -> Option<&Arc<dyn DtlsTransportInternal>> {
        self.slot(component).as_ref().map(|b| &b.transport)
    }

    pub fn rtp_transport(&self) -> Option<&Arc<dyn DtlsTransportInternal>> {
        self.transport(Component::Rtp)
    }

    pub fn rtcp_transport(&self) -> Option<&Arc<dyn DtlsTransportInternal>> {
        self.transport(Component::Rtcp)
    }

    pub fn has_rtcp_transport(&self) -> bool {
        self.rtcp.is_some()
    }

    /// is_bound_to tells whether a notification from `transport_name` for
    /// `component` comes from a currently bound transport.
    pub fn is_bound_to(&self, transport_name: &str, component: Component) -> bool {
        self.transport(component)
            .is_some_and(|t| t.transport_name() == transport_name)
    }

    /// transports_writable aggregates the writability of the bound transports.
    pub fn transports_writable(&self) -> bool {
        aggregate_writable(
            self.rtp_transport().map(|t| t.writable()),
            self.rtcp_transport().map(|t| t.writable()),
        )
    }

    /// create asks the controller for a transport and subscribes `observer`
    /// to it, replacing whatever was bound for `component`. On failure the
    /// previous transport stays bound.
    pub fn create(
        &mut self,
        transport_name: &str,
        component: Component,
        observer: Arc<dyn TransportObserver>,
    ) -> Result<Arc<dyn DtlsTransportInternal>> {
        let transport = self
            .controller
            .create_transport(transport_name, component)
            .inspect_err(|err| warn!("failed to create {component} transport {transport_name}: {err}"))?;

        self.release(component);

        let subscription = transport.subscribe(observer);
        *self.slot_mut(component) = Some(BoundTransport {
            transport: Arc::clone(&transport),
            subscription: Some(subscription),
        });
        info!("bound {component} transport {transport_name}");

        Ok(transport)
    }

    /// release unsubscribes from the transport of `component` and then asks
    /// the controller to destroy it.
    pub fn release(&mut self, component: Component) {
        if let Some(mut bound) = self.slot_mut(component).take() {
            drop(bound.subscription.take());
            let name = bound.transport.transport_name().to_owned();
            drop(bound);
            self.controller.destroy_transport(&name, component);
            debug!("released {component} transport {name}");
        }
    }

    fn slot(&self, component: Component) -> &Option<BoundTransport> {
        match component {
            Component::Rtp => &self.rtp,
            Component::Rtcp => &self.rtcp,
        }
    }

    fn slot_mut(&mut self, component: Component) -> &mut Option<BoundTransport> {
        match component {
            Component::Rtp => &mut self.rtp,
            Component::Rtcp => &mut self.rtcp,
        }
    }
}

impl Drop for TransportBinding {
    fn drop(&mut self) {
        self.release(Component::Rtp);
        self.release(Component::Rtcp);
    }
}
