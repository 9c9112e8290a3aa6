use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use log::warn;
use shared::crypto::KeyingMaterialExporter;
use shared::error::Result;
use srtp::protection_profile::ProtectionProfile;

/// Component identifies the RTP or RTCP transport of a channel, numbered
/// as ICE components.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Rtp = 1,
    Rtcp = 2,
}

impl Component {
    pub fn is_rtcp(&self) -> bool {
        *self == Component::Rtcp
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Component::Rtp => write!(f, "rtp"),
            Component::Rtcp => write!(f, "rtcp"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsRole {
    Client,
    Server,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsTransportState {
    #[default]
    New,
    Connecting,
    Connected,
    Closed,
    Failed,
}

impl fmt::Display for DtlsTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DtlsTransportState::New => "new",
            DtlsTransportState::Connecting => "connecting",
            DtlsTransportState::Connected => "connected",
            DtlsTransportState::Closed => "closed",
            DtlsTransportState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// PacketOptions travel with an outbound packet down to the socket.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PacketOptions {
    pub dscp: Option<u8>,
    pub packet_id: Option<u64>,
}

/// TransportObserver receives the notifications of one transport.
pub trait TransportObserver: Send + Sync {
    fn on_writable_state(&self);
    fn on_ready_to_send(&self);
    fn on_read_packet(&self, data: &[u8], packet_time: Option<Instant>);
    fn on_dtls_state(&self, state: DtlsTransportState);
}

/// DtlsTransportInternal is what the channel needs from a DTLS transport.
/// Handles are shared with the controller that owns them.
pub trait DtlsTransportInternal: KeyingMaterialExporter + Send + Sync {
    fn transport_name(&self) -> &str;
    fn component(&self) -> Component;
    fn writable(&self) -> bool;
    /// Defaults to writability for transports without a separate signal.
    fn ready_to_send(&self) -> bool {
        self.writable()
    }
    fn is_dtls_active(&self) -> bool;
    fn dtls_state(&self) -> DtlsTransportState;
    fn dtls_role(&self) -> Option<DtlsRole>;
    fn selected_srtp_protection_profile(&self) -> Option<ProtectionProfile>;
    fn set_srtp_protection_profiles(&self, profiles: &[ProtectionProfile]) -> Result<()>;
    /// Returns the number of bytes written. Would-block is reported as
    /// `Error::ErrWouldBlock`.
    fn send_packet(&self, data: &[u8], options: &PacketOptions) -> Result<usize>;
    fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> TransportSubscription;
}

/// TransportController creates and destroys the transports of a session.
pub trait TransportController: Send + Sync {
    fn create_transport(
        &self,
        transport_name: &str,
        component: Component,
    ) -> Result<Arc<dyn DtlsTransportInternal>>;
    fn destroy_transport(&self, transport_name: &str, component: Component);
}

/// TransportSubscription unregisters its observer when dropped.
pub struct TransportSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl TransportSubscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        TransportSubscription {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription that does nothing when dropped.
    pub fn empty() -> Self {
        TransportSubscription { unsubscribe: None }
    }
}

impl Drop for TransportSubscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for TransportSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ObserverSlots {
    next_id: u64,
    observers: HashMap<u64, Arc<dyn TransportObserver>>,
}

/// TransportObservers is a registry transports can use to implement
/// subscribe and fan out notifications.
#[derive(Default, Clone)]
pub struct TransportObservers {
    slots: Arc<Mutex<ObserverSlots>>,
}

impl TransportObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> TransportSubscription {
        let id = match self.slots.lock() {
            Ok(mut slots) => {
                let id = slots.next_id;
                slots.next_id += 1;
                slots.observers.insert(id, observer);
                id
            }
            Err(err) => {
                warn!("failed to register transport observer: {err}");
                return TransportSubscription::empty();
            }
        };

        let slots: Weak<Mutex<ObserverSlots>> = Arc::downgrade(&self.slots);
        TransportSubscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                if let Ok(mut slots) = slots.lock() {
                    slots.observers.remove(&id);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.observers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// notify calls `f` on a snapshot of the observers, outside the lock.
    pub fn notify(&self, f: impl Fn(&dyn TransportObserver)) {
        let observers: Vec<Arc<dyn TransportObserver>> = match self.slots.lock() {
            Ok(slots) => slots.observers.values().cloned().collect(),
            Err(_) => return,
        };
        for observer in observers {
            f(observer.as_ref());
        }
    }
}
