//! Network monitor backed by the host's interface table
use crate::network::{Availability, NetworkBinding, NetworkMonitor, RegistrationId, Transport};
use crate::{Config, Error, Result};
use std::collections::HashMap;
use std::net::{IpAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const WIFI_PREFIXES: &[&str] = &["wl", "wifi", "ath"];
const CELLULAR_PREFIXES: &[&str] = &["wwan", "rmnet", "ccmni", "pdp_ip", "ppp"];
const ETHERNET_PREFIXES: &[&str] = &["eth", "en", "em"];

// Documentation range, only used to ask the kernel which source address it would pick
const ROUTE_PROBE: &str = "203.0.113.1:9";

#[derive(Debug, Clone, Default)]
struct Classifier {
    wifi: Option<String>,
    cellular: Option<String>,
}

impl Classifier {
    fn classify(&self, name: &str) -> Transport {
        if self.wifi.as_deref() == Some(name) {
            return Transport::Wifi;
        }
        if self.cellular.as_deref() == Some(name) {
            return Transport::Cellular;
        }
        let has = |prefixes: &[&str]| prefixes.iter().any(|p| name.starts_with(p));
        if has(WIFI_PREFIXES) {
            Transport::Wifi
        } else if has(CELLULAR_PREFIXES) {
            Transport::Cellular
        } else if has(ETHERNET_PREFIXES) {
            Transport::Ethernet
        } else {
            Transport::Other
        }
    }

    /// Usable bindings, IPv4 first
    fn scan(&self) -> Result<Vec<NetworkBinding>> {
        let mut found = interfaces()?
            .into_iter()
            .map(|(name, ip)| NetworkBinding::new(self.classify(&name), name, ip))
            .collect::<Vec<_>>();
        found.sort_by_key(|b| b.address.is_ipv6());
        Ok(found)
    }
}

#[cfg(unix)]
fn interfaces() -> Result<Vec<(String, IpAddr)>> {
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::InterfaceFlags;
    use std::net::{SocketAddrV4, SocketAddrV6};

    let addrs = getifaddrs().map_err(|e| Error::Interfaces(e.to_string()))?;
    let mut out = Vec::new();
    for ifa in addrs {
        if !ifa.flags.contains(InterfaceFlags::IFF_UP)
            || ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK)
        {
            continue;
        }
        let ip = match ifa.address.as_ref() {
            Some(addr) => {
                if let Some(v4) = addr.as_sockaddr_in() {
                    IpAddr::V4(*SocketAddrV4::from(*v4).ip())
                } else if let Some(v6) = addr.as_sockaddr_in6() {
                    IpAddr::V6(*SocketAddrV6::from(*v6).ip())
                } else {
                    continue;
                }
            }
            None => continue,
        };
        // link-local v6 needs a scope id a plain local_address can't carry
        if let IpAddr::V6(v6) = ip {
            if v6.segments()[0] & 0xffc0 == 0xfe80 {
                continue;
            }
        }
        out.push((ifa.interface_name, ip));
    }
    Ok(out)
}

#[cfg(not(unix))]
fn interfaces() -> Result<Vec<(String, IpAddr)>> {
    Ok(Vec::new())
}

/// Source address the kernel uses for the default route
fn default_source() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(ROUTE_PROBE).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// [`NetworkMonitor`] that watches the host's interface table.
///
/// Each registration polls the table until an interface of the requested
/// transport shows up; unregistering stops the poll.
#[derive(Debug, Clone)]
pub struct SystemNetworks {
    classifier: Classifier,
    poll: Duration,
    next_id: Arc<AtomicU64>,
    watchers: Arc<Mutex<HashMap<RegistrationId, JoinHandle<()>>>>,
}

impl SystemNetworks {
    pub fn new(config: &Config) -> Self {
        Self {
            classifier: Classifier {
                wifi: config.wifi_interface.clone(),
                cellular: config.cellular_interface.clone(),
            },
            poll: config.interface_poll,
            next_id: Arc::new(AtomicU64::new(0)),
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Every usable interface right now
    pub fn bindings(&self) -> Result<Vec<NetworkBinding>> {
        self.classifier.scan()
    }
}

impl NetworkMonitor for SystemNetworks {
    fn active(&self) -> Option<NetworkBinding> {
        let source = default_source()?;
        let found = self.classifier.scan().ok()?;
        found.into_iter().find(|b| b.address == source)
    }

    fn register(
        &self,
        transport: Transport,
        notify: UnboundedSender<Availability>,
    ) -> Result<RegistrationId> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let classifier = self.classifier.clone();
        let poll = self.poll;
        let watcher = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;
                match classifier.scan() {
                    Ok(found) => {
                        if let Some(b) = found.into_iter().find(|b| b.transport == transport) {
                            debug!("{} appeared on {}", transport, b.interface);
                            let _ = notify.send(Availability::Available(b));
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Interface scan failed: {}", e);
                        let _ = notify.send(Availability::Unavailable);
                        return;
                    }
                }
            }
        });
        self.watchers
            .lock()
            .map_err(|e| Error::Interfaces(e.to_string()))?
            .insert(id, watcher);
        Ok(id)
    }

    fn unregister(&self, id: RegistrationId) -> bool {
        let watcher = match self.watchers.lock() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        };
        match watcher {
            Some(w) => {
                w.abort();
                true
            }
            None => false,
        }
    }
}
