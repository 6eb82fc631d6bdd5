use clap::Parser;
use clap_verbosity_flag::Verbosity;
use dualdl::{Config, ConfigBuilder, ConfigBuilderError};
use std::path::PathBuf;
use std::time::Duration;

/// Download one file over Wi-Fi and Cellular at once
#[derive(Debug, Parser)]
#[clap(name = "dualdl", version)]
pub(crate) struct App {
    /// URL of the file
    pub(crate) url: String,
    /// Where to save the file
    #[clap(short, long, parse(from_os_str))]
    pub(crate) output: PathBuf,
    #[clap(flatten)]
    pub(crate) verbose: Verbosity,
    /// Directory for the part files
    #[clap(long, parse(from_os_str))]
    pub(crate) temp_dir: Option<PathBuf>,
    /// Seconds to wait for each interface
    #[clap(long)]
    pub(crate) resolve_timeout: Option<u64>,
    /// Connect and read timeout of each range, in seconds
    #[clap(long)]
    pub(crate) range_timeout: Option<u64>,
    /// Interface to use as Wi-Fi
    #[clap(long)]
    pub(crate) wifi_interface: Option<String>,
    /// Interface to use as Cellular
    #[clap(long)]
    pub(crate) cellular_interface: Option<String>,
}

impl App {
    pub(crate) fn new() -> Self {
        Self::parse()
    }
    pub(crate) fn init_logging(&self) {
        let _ = pretty_env_logger::formatted_builder()
            .filter_level(self.verbose.log_level_filter())
            .try_init();
    }
    pub(crate) fn config(&self) -> Result<Config, ConfigBuilderError> {
        let mut builder = ConfigBuilder::default();
        if let Some(dir) = &self.temp_dir {
            builder.temp_dir(dir.clone());
        }
        if let Some(secs) = self.resolve_timeout {
            builder.resolve_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.range_timeout {
            builder.range_timeout(Duration::from_secs(secs));
        }
        if let Some(name) = &self.wifi_interface {
            builder.wifi_interface(name.clone());
        }
        if let Some(name) = &self.cellular_interface {
            builder.cellular_interface(name.clone());
        }
        builder.build()
    }
}
