use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Kind of a host notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Log,
    Status,
    Progress,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Log => "log",
            Self::Status => "status",
            Self::Progress => "progress",
        };
        f.write_str(s)
    }
}

/// One notification for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub message: String,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Status messages; [`is_terminal`] picks the three that end a job
pub mod status {
    pub const COMPLETE: &str = "Download Complete!";
    pub const FAILED: &str = "Download Failed";
    pub const STOPPED: &str = "Stopped";
    pub const DOWNLOADING: &str = "Downloading...";
    pub const MERGING: &str = "Merging...";

    /// True for the three messages that end a job
    pub fn is_terminal(message: &str) -> bool {
        message == COMPLETE || message == FAILED || message == STOPPED
    }
}

/// Fire-and-forget fan-out to at most one listener.
///
/// Events emitted while nobody listens are dropped, never queued.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    listener: Arc<Mutex<Option<UnboundedSender<Event>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, replacing any previous one
    pub fn attach(&self) -> UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(tx);
        }
        rx
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }
    }

    pub fn emit(&self, kind: EventKind, message: impl Into<String>) {
        let event = Event::new(kind, message);
        match kind {
            EventKind::Progress => debug!(kind = %kind, "{}", event.message),
            _ => info!(kind = %kind, "{}", event.message),
        }
        if let Ok(mut slot) = self.listener.lock() {
            let closed = match slot.as_ref() {
                Some(tx) => tx.send(event).is_err(),
                None => false,
            };
            if closed {
                slot.take();
            }
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(EventKind::Log, message)
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(EventKind::Status, message)
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.emit(EventKind::Progress, message)
    }
}
