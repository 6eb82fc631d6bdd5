use crate::network::{Availability, NetworkBinding, NetworkMonitor, RegistrationId, Transport};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Looks up one network per transport class, with a bounded wait
#[derive(Clone)]
pub struct NetworkResolver {
    monitor: Arc<dyn NetworkMonitor>,
    timeout: Duration,
}

/// Registration that is unregistered exactly once, when released or dropped
struct Registration {
    monitor: Arc<dyn NetworkMonitor>,
    id: Option<RegistrationId>,
}

impl Registration {
    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if !self.monitor.unregister(id) {
                debug!("Registration {:?} was already gone", id);
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

impl NetworkResolver {
    pub fn new(monitor: Arc<dyn NetworkMonitor>, timeout: Duration) -> Self {
        Self { monitor, timeout }
    }

    /// Find a network of `transport`.
    ///
    /// Returns the active network straight away when it already matches. Otherwise
    /// registers a one-shot request and waits for the first answer:
    /// `Ok(Some(_))` when granted, `Ok(None)` when the monitor reports it unavailable,
    /// [`Error::NetworkResolutionTimeout`] after the timeout and [`Error::Cancelled`]
    /// when `cancel` fires. The request is unregistered on every path.
    #[instrument(skip(self, cancel))]
    pub async fn resolve(
        &self,
        transport: Transport,
        cancel: &CancellationToken,
    ) -> Result<Option<NetworkBinding>> {
        if let Some(active) = self.monitor.active() {
            if active.transport == transport {
                debug!("Active network already is {}", active);
                return Ok(Some(active));
            }
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registration = Registration {
            monitor: self.monitor.clone(),
            id: Some(self.monitor.register(transport, tx)?),
        };
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            answer = tokio::time::timeout(self.timeout, rx.recv()) => match answer {
                Ok(Some(Availability::Available(binding))) => Ok(Some(binding)),
                Ok(Some(Availability::Unavailable)) | Ok(None) => Ok(None),
                Err(_) => Err(Error::NetworkResolutionTimeout(transport)),
            },
        };
        registration.release();
        debug!("Resolved {}: {:?}", transport, outcome);
        outcome
    }
}
