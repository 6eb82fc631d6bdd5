use std::path::PathBuf;
use std::time::Duration;

/// Names of the two part files inside [`Config::temp_dir`]
pub(crate) const PART_FILES: [&str; 2] = ["part1.tmp", "part2.tmp"];

/// Tunables for a [`Coordinator`][crate::Coordinator]
///
/// Every field has a default, so `ConfigBuilder::default().build()` always works.
///
/// ```
/// use dualdl::ConfigBuilder;
/// use std::time::Duration;
/// # fn main() -> Result<(), dualdl::ConfigBuilderError> {
/// let config = ConfigBuilder::default()
///     .resolve_timeout(Duration::from_secs(5))
///     .wifi_interface("wlan0")
///     .build()?;
/// assert_eq!(config.buffer_size, 8192);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct Config {
    /// How long to wait for a network of one transport class
    pub resolve_timeout: Duration,
    /// Connect timeout and per-read stall timeout of a range fetch
    pub range_timeout: Duration,
    /// Timeout of the HEAD request that learns the size
    pub probe_timeout: Duration,
    /// Period of progress snapshots
    pub tick_interval: Duration,
    /// Largest slice written to a part file between cancellation checks
    pub buffer_size: usize,
    /// Directory holding the job's part files
    #[builder(setter(into))]
    pub temp_dir: PathBuf,
    /// Interface to treat as Wi-Fi regardless of its name
    #[builder(setter(into, strip_option))]
    pub wifi_interface: Option<String>,
    /// Interface to treat as Cellular regardless of its name
    #[builder(setter(into, strip_option))]
    pub cellular_interface: Option<String>,
    /// Rescan period of the system network monitor
    pub interface_poll: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(3),
            range_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(15),
            tick_interval: Duration::from_secs(1),
            buffer_size: 8 * 1024,
            temp_dir: std::env::temp_dir().join("dualdl"),
            wifi_interface: None,
            cellular_interface: None,
            interface_poll: Duration::from_millis(250),
        }
    }
}

impl Config {
    /// Paths of the two part files, in range order
    pub fn part_paths(&self) -> [PathBuf; 2] {
        [
            self.temp_dir.join(PART_FILES[0]),
            self.temp_dir.join(PART_FILES[1]),
        ]
    }
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.buffer_size == Some(0) {
            return Err("buffer_size must be positive".to_string());
        }
        let durations = [
            ("resolve_timeout", self.resolve_timeout),
            ("range_timeout", self.range_timeout),
            ("probe_timeout", self.probe_timeout),
            ("tick_interval", self.tick_interval),
            ("interface_poll", self.interface_poll),
        ];
        for (name, value) in durations {
            if value == Some(Duration::ZERO) {
                return Err(format!("{} must be positive", name));
            }
        }
        Ok(())
    }
}
