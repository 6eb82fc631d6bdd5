use crate::Result;
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Transport class of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Wifi,
    Cellular,
    Ethernet,
    Other,
}

impl Transport {
    /// Short label used in log and progress lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Wifi => "Wi-Fi",
            Self::Cellular => "Cell",
            Self::Ethernet => "Ethernet",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cellular => write!(f, "Cellular"),
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Label shown for a range that rides the platform's default route
pub const DEFAULT_ROUTE_LABEL: &str = "Def";

/// Handle to one network path that outbound connections can be routed over.
///
/// The binding only describes the path, it never owns the OS registration that
/// surfaced it. Routing over it binds the socket's local address to `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkBinding {
    pub transport: Transport,
    pub interface: String,
    pub address: IpAddr,
}

impl NetworkBinding {
    pub fn new(transport: Transport, interface: impl Into<String>, address: IpAddr) -> Self {
        Self {
            transport,
            interface: interface.into(),
            address,
        }
    }
    pub fn label(&self) -> &'static str {
        self.transport.label()
    }
}

impl fmt::Display for NetworkBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.transport, self.interface, self.address)
    }
}

/// Notification delivered to a capability request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available(NetworkBinding),
    Unavailable,
}

/// Identifies one capability request registered with a [`NetworkMonitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Source of network availability, the seam between the engine and the platform
pub trait NetworkMonitor: Send + Sync + 'static {
    /// The network currently carrying the default route, if known
    fn active(&self) -> Option<NetworkBinding>;

    /// Ask to be told once a network of `transport` is available.
    ///
    /// The monitor sends at most one meaningful [`Availability`] on `notify`.
    fn register(
        &self,
        transport: Transport,
        notify: UnboundedSender<Availability>,
    ) -> Result<RegistrationId>;

    /// Drop interest in a registration. Returns whether it was still registered.
    fn unregister(&self, id: RegistrationId) -> bool;
}

/// Monitor over a fixed set of bindings, for hosts that already know their paths.
///
/// Requests are answered immediately: `Available` when a binding of the
/// transport is known, `Unavailable` otherwise.
#[derive(Debug, Default)]
pub struct StaticNetworks {
    active: Option<NetworkBinding>,
    bindings: Vec<NetworkBinding>,
    next_id: AtomicU64,
    registered: Mutex<HashSet<RegistrationId>>,
}

impl StaticNetworks {
    pub fn new(active: Option<NetworkBinding>, bindings: Vec<NetworkBinding>) -> Self {
        Self {
            active,
            bindings,
            ..Self::default()
        }
    }

    /// Registrations not yet unregistered
    pub fn outstanding(&self) -> usize {
        self.registered.lock().map(|set| set.len()).unwrap_or(0)
    }
}

impl NetworkMonitor for StaticNetworks {
    fn active(&self) -> Option<NetworkBinding> {
        self.active.clone()
    }

    fn register(
        &self,
        transport: Transport,
        notify: UnboundedSender<Availability>,
    ) -> Result<RegistrationId> {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut set) = self.registered.lock() {
            set.insert(id);
        }
        let answer = self
            .bindings
            .iter()
            .find(|b| b.transport == transport)
            .cloned()
            .map(Availability::Available)
            .unwrap_or(Availability::Unavailable);
        let _ = notify.send(answer);
        Ok(id)
    }

    fn unregister(&self, id: RegistrationId) -> bool {
        self.registered
            .lock()
            .map(|mut set| set.remove(&id))
            .unwrap_or(false)
    }
}
