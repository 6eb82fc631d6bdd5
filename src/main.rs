mod app;

use crate::app::App;
use anyhow::{bail, Context, Result};
use dualdl::{status, Coordinator, EventKind, JobState, SystemNetworks};
#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let app = App::new();
    app.init_logging();
    let config = app.config().context("Invalid options")?;
    let monitor = Arc::new(SystemNetworks::new(&config));
    match monitor.bindings() {
        Ok(found) if found.is_empty() => warn!("No usable interfaces, using the default route"),
        Ok(found) => found.iter().for_each(|b| debug!("Found {}", b)),
        Err(e) => warn!("{}", e),
    }
    let coordinator = Arc::new(Coordinator::new(config, monitor)?);
    let mut events = coordinator.listen();
    coordinator.start(&app.url, &app.output)?;

    let stopper = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    #[cfg(feature = "progress")]
    let spinner = {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}"));
        pb.enable_steady_tick(120);
        pb
    };

    while let Some(event) = events.recv().await {
        match event.kind {
            #[cfg(feature = "progress")]
            EventKind::Progress => spinner.set_message(event.message),
            #[cfg(not(feature = "progress"))]
            EventKind::Progress => println!("{}", event.message),
            EventKind::Log => println!("{}", event.message),
            EventKind::Status => {
                println!("== {} ==", event.message);
                if status::is_terminal(&event.message) {
                    break;
                }
            }
        }
    }
    #[cfg(feature = "progress")]
    spinner.finish_and_clear();

    match coordinator.wait().await {
        JobState::Completed => Ok(()),
        state => bail!("Download ended as {:?}", state),
    }
}
