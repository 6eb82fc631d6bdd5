use crate::network::Transport;
use thiserror::Error;
use tokio::io;

/// Error definition for possible errors in this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the size probe reported no usable content length
    #[error("Invalid Content-Length: {0}")]
    SizeUnavailable(String),
    /// Returned when no network of the requested transport appeared in time
    #[error("Timed out waiting for a {0} network")]
    NetworkResolutionTimeout(Transport),
    /// Returned when a range request got neither 206 nor an acceptable 200
    #[error("Server returned {status} for {label}")]
    UnexpectedStatus {
        label: String,
        status: reqwest::StatusCode,
    },
    /// Returned when the server ignored the range header and sent the whole resource
    #[error("Server ignored the range request for {label}")]
    RangeIgnored { label: String },
    /// Returned when the body didn't match the requested window
    #[error("{label} expected {expected} bytes, received {received}")]
    LengthMismatch {
        label: String,
        expected: u64,
        received: u64,
    },
    /// Returned when connecting or reading a range stalled for too long
    #[error("Timed out fetching {label}")]
    RangeTimeout { label: String },
    /// Represents problems with network connectivity
    #[error("Connection error: {0}")]
    ConnectionError(#[from] reqwest::Error),
    /// Returned when concatenating the part files failed
    #[error("Merge failed: {0}")]
    MergeFailed(#[source] io::Error),
    /// The job was stopped on purpose, not a failure
    #[error("Cancelled")]
    Cancelled,
    /// Returned when a required argument is missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Returned when the url couldn't be parsed
    #[error("Failed to parse URL: {0}")]
    UrlParse(#[from] url::ParseError),
    /// Represents problems with Tokio based IO
    #[error("Tokio IO error: {0}")]
    Io(#[from] io::Error),
    /// A spawned task panicked or was aborted
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Returned when no Tokio runtime is available to run jobs on
    #[error("No runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    /// Listing the system's network interfaces failed
    #[error("Interface enumeration failed: {0}")]
    Interfaces(String),
}

impl Error {
    /// True for deliberate stops, which are reported as `Stopped` rather than as failures
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Alias for Result<T, dualdl::Error>
pub type Result<T> = std::result::Result<T, Error>;
