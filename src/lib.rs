//! Dual-route downloads
//!
//! Downloads one resource by splitting it into two byte ranges and fetching them
//! at the same time over two network interfaces, Wi-Fi and Cellular when both are
//! around, falling back to whatever is available and finally to the default route.
//! The parts are then stitched together in order at the destination.
//!
//! The crate exposes debug logs through the [`tracing`][tracing] crate
//!
//! ## Feature flags
//!
//! - `rustls`: Use rustls for HTTPS, on by default
//! - `openssl`: Use openssl for HTTPS
//! - `progress`: Progress spinner in the `dualdl` binary, on by default
//!
//! ## Crate usage
//!
//! ```no_run
//! use dualdl::{Config, Coordinator, JobState, SystemNetworks};
//! use std::sync::Arc;
//! #[tokio::main]
//! async fn main() -> Result<(), dualdl::Error> {
//!     let config = Config::default();
//!     let coordinator = Coordinator::new(config.clone(), Arc::new(SystemNetworks::new(&config)))?;
//!     coordinator.start("https://crates.io/big.tar", "big.tar")?;
//!     assert_eq!(coordinator.wait().await, JobState::Completed);
//!     Ok(())
//! }
//! ```
#[macro_use]
extern crate derive_builder;

mod config;
mod coordinator;
mod error;
pub mod events;
mod fetch;
mod merge;
mod network;
pub mod probe;
mod progress;
mod range;
mod resolver;
mod system;

pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use coordinator::{Coordinator, JobState};
pub use error::{Error, Result};
pub use events::{status, Event, EventKind, EventSink};
pub use fetch::RangeFetcher;
pub use merge::merge;
pub use network::{
    Availability, NetworkBinding, NetworkMonitor, RegistrationId, StaticNetworks, Transport,
    DEFAULT_ROUTE_LABEL,
};
pub use progress::{aggregate, ProgressSnapshot, RangeShare};
pub use range::{ByteRange, RangeProgress, RangeTask};
pub use resolver::NetworkResolver;
pub use reqwest::Url;
pub use system::SystemNetworks;
