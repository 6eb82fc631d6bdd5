use crate::events::{status, Event, EventSink};
use crate::fetch::RangeFetcher;
use crate::merge::{self, discard_parts};
use crate::network::{NetworkBinding, NetworkMonitor, Transport};
use crate::progress;
use crate::range::{ByteRange, RangeTask};
use crate::resolver::NetworkResolver;
use crate::{probe, Config, Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::fs;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Lifecycle of a download job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Probing,
    ResolvingNetworks,
    Downloading,
    Merging,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

type JobDone = Shared<BoxFuture<'static, JobState>>;

struct ActiveJob {
    cancel: CancellationToken,
    done: JobDone,
}

/// State shared between the coordinator and the job it is running
#[derive(Clone)]
struct JobContext {
    config: Arc<Config>,
    monitor: Arc<dyn NetworkMonitor>,
    sink: EventSink,
    state: Arc<watch::Sender<JobState>>,
    current: Arc<AtomicU64>,
}

/// Runs at most one dual-route download at a time.
///
/// [`start`][Coordinator::start] returns straight away; all feedback arrives as
/// [`Event`]s on the receiver from [`listen`][Coordinator::listen]. Starting again
/// while a job runs cancels that job and waits for its teardown before the new
/// one begins probing.
///
/// # Example
///
/// ```no_run
/// use dualdl::{Config, Coordinator, SystemNetworks};
/// use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), dualdl::Error> {
/// let config = Config::default();
/// let monitor = Arc::new(SystemNetworks::new(&config));
/// let coordinator = Coordinator::new(config, monitor)?;
/// let mut events = coordinator.listen();
/// coordinator.start("https://example.com/big.iso", "big.iso")?;
/// while let Some(event) = events.recv().await {
///     println!("{}: {}", event.kind, event.message);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    ctx: JobContext,
    state_rx: watch::Receiver<JobState>,
    runtime: Handle,
    active: Mutex<Option<ActiveJob>>,
}

impl Coordinator {
    /// Coordinator running its jobs on the current Tokio runtime
    pub fn new(config: Config, monitor: Arc<dyn NetworkMonitor>) -> Result<Self> {
        Ok(Self::with_runtime(config, monitor, Handle::try_current()?))
    }

    /// Coordinator running its jobs on `runtime`
    pub fn with_runtime(config: Config, monitor: Arc<dyn NetworkMonitor>, runtime: Handle) -> Self {
        let (state, state_rx) = watch::channel(JobState::Idle);
        Self {
            ctx: JobContext {
                config: Arc::new(config),
                monitor,
                sink: EventSink::new(),
                state: Arc::new(state),
                current: Arc::new(AtomicU64::new(0)),
            },
            state_rx,
            runtime,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach the event listener, replacing any previous one
    pub fn listen(&self) -> UnboundedReceiver<Event> {
        self.ctx.sink.attach()
    }

    /// Detach the event listener; later events are dropped
    pub fn unlisten(&self) {
        self.ctx.sink.detach()
    }

    /// State of the most recently started job
    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Watch state changes of the most recently started job
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_rx.clone()
    }

    /// Start downloading `url` into `destination`.
    ///
    /// Fails only on missing arguments or an unparsable URL; everything else is
    /// reported through events. A job already running is cancelled first.
    pub fn start(&self, url: &str, destination: impl AsRef<Path>) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidArgument("url"));
        }
        let destination = destination.as_ref();
        if destination.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("destination"));
        }
        let url = Url::parse(url)?;

        let mut active = self.active();
        let previous = active.take().map(|job| {
            debug!("Superseding the running job");
            job.cancel.cancel();
            job.done
        });
        let id = self.ctx.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.ctx.state.send(JobState::Idle);
        let cancel = CancellationToken::new();
        let job = Job {
            id,
            url,
            destination: destination.to_path_buf(),
            cancel: cancel.clone(),
            ctx: self.ctx.clone(),
        };
        let handle = self.runtime.spawn(job.run(previous));
        let done = async move {
            handle.await.unwrap_or_else(|e| {
                error!("Job task died: {}", e);
                JobState::Failed
            })
        }
        .boxed()
        .shared();
        *active = Some(ActiveJob { cancel, done });
        Ok(())
    }

    /// Cancel the running job, if any. Returns immediately.
    pub fn stop(&self) {
        match self.active().as_ref() {
            Some(job) => job.cancel.cancel(),
            None => self.ctx.sink.log("No download to stop."),
        }
    }

    /// Wait for the most recently started job to finish
    pub async fn wait(&self) -> JobState {
        let done = self.active().as_ref().map(|job| job.done.clone());
        match done {
            Some(done) => done.await,
            None => self.state(),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(job) = self.active().as_ref() {
            job.cancel.cancel();
        }
    }
}

struct Job {
    id: u64,
    url: Url,
    destination: PathBuf,
    cancel: CancellationToken,
    ctx: JobContext,
}

impl Job {
    fn sink(&self) -> &EventSink {
        &self.ctx.sink
    }

    fn config(&self) -> &Config {
        &self.ctx.config
    }

    fn set_state(&self, state: JobState) {
        if self.ctx.current.load(Ordering::SeqCst) == self.id {
            let _ = self.ctx.state.send(state);
        }
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn run(self, previous: Option<JobDone>) -> JobState {
        if let Some(previous) = previous {
            let prior = previous.await;
            debug!("Previous job ended as {:?}", prior);
        }
        let state = match self.execute().await {
            Ok(_) => {
                self.sink().log(format!(
                    "Download Complete! Saved to {}",
                    self.destination.display()
                ));
                self.sink().status(status::COMPLETE);
                JobState::Completed
            }
            Err(e) if e.is_cancelled() => {
                self.sink().log("Download stopped by user.");
                self.sink().status(status::STOPPED);
                JobState::Cancelled
            }
            Err(e) => {
                error!("Download failed: {}", e);
                self.sink().log(format!("Error: {}", e));
                self.sink().status(status::FAILED);
                JobState::Failed
            }
        };
        self.set_state(state);
        state
    }

    #[instrument(skip(self), fields(URL=%self.url, job=self.id))]
    async fn execute(&self) -> Result<u64> {
        self.check_cancel()?;
        self.set_state(JobState::Probing);
        self.sink().log("Initializing Dual-Stack Engine...");
        self.sink().log("Probing file size via Default Route...");
        let client = Client::builder()
            .timeout(self.config().probe_timeout)
            .build()?;
        let total = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            len = probe::content_length(&client, &self.url) => len?,
        };
        self.sink()
            .log(format!("File Size: {} MB", total / 1024 / 1024));

        self.set_state(JobState::ResolvingNetworks);
        self.sink()
            .log("Requesting Network Handles (Wi-Fi & Cellular)...");
        let resolver = NetworkResolver::new(
            self.ctx.monitor.clone(),
            self.config().resolve_timeout,
        );
        let (wifi, cellular) = tokio::join!(
            self.lookup(&resolver, Transport::Wifi),
            self.lookup(&resolver, Transport::Cellular)
        );
        let (wifi, cellular) = (wifi?, cellular?);
        self.sink().log(match (&wifi, &cellular) {
            (Some(_), Some(_)) => "SUCCESS: Wi-Fi and Cellular both acquired! Binding sockets...",
            (Some(_), None) => "WARNING: Only Wi-Fi acquired. Using Single Interface.",
            (None, Some(_)) => "WARNING: Only Cellular acquired. Using Single Interface.",
            (None, None) => "WARNING: Using Default Route (No specific handles).",
        });

        let parts = self.config().part_paths();
        fs::create_dir_all(&self.config().temp_dir).await?;
        // leftovers of an earlier failed merge go here too
        discard_parts(&parts).await;
        let [first, second] = ByteRange::split_in_two(total);
        let [p1, p2] = parts.clone();
        let second_route = cellular.or_else(|| wifi.clone());
        let tasks = Arc::new(vec![
            RangeTask::new(1, first, wifi, p1),
            RangeTask::new(2, second, second_route, p2),
        ]);
        for task in tasks.iter() {
            match &task.binding {
                Some(b) => debug!("[{}] bound to {}", task.tag(), b),
                None => warn!("[{}] no interface handle, using the default route", task.tag()),
            }
        }

        self.check_cancel()?;
        self.set_state(JobState::Downloading);
        self.sink().status(status::DOWNLOADING);
        if let Err(e) = self.download(tasks, total).await {
            discard_parts(&parts).await;
            return Err(e);
        }

        self.set_state(JobState::Merging);
        self.sink().status(status::MERGING);
        self.sink()
            .log("Merging parts into final destination...");
        match merge::merge(&parts, &self.destination, &self.cancel).await {
            Err(e) if e.is_cancelled() => {
                discard_parts(&parts).await;
                Err(e)
            }
            merged => merged,
        }
    }

    async fn lookup(
        &self,
        resolver: &NetworkResolver,
        transport: Transport,
    ) -> Result<Option<NetworkBinding>> {
        match resolver.resolve(transport, &self.cancel).await {
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                debug!("{} not available: {}", transport, e);
                Ok(None)
            }
            found => found,
        }
    }

    /// Run both fetchers and the progress ticker; the first failure cancels the sibling
    async fn download(&self, tasks: Arc<Vec<RangeTask>>, total: u64) -> Result<()> {
        let fetcher = RangeFetcher::new(self.url.clone(), total, self.config());
        let fetch_cancel = self.cancel.child_token();
        let stop = self.cancel.child_token();
        let ticker = tokio::spawn(progress::aggregate(
            tasks.clone(),
            self.sink().clone(),
            self.config().tick_interval,
            stop.clone(),
        ));

        let mut running = tasks
            .iter()
            .cloned()
            .map(|task| {
                let fetcher = fetcher.clone();
                let cancel = fetch_cancel.clone();
                let sink = self.sink().clone();
                tokio::spawn(async move {
                    let res = fetcher.fetch(&task, &cancel).await;
                    match &res {
                        Ok(_) => sink.log(format!("[{}] Chunk download finished.", task.tag())),
                        Err(e) if !e.is_cancelled() => {
                            sink.log(format!("[{}] Failed: {}", task.tag(), e))
                        }
                        Err(_) => {}
                    }
                    res
                })
            })
            .collect::<FuturesUnordered<_>>();

        let mut failure: Option<Error> = None;
        while let Some(joined) = running.next().await {
            let res = joined.map_err(Error::from).and_then(|r| r.map(|_| ()));
            if let Err(e) = res {
                fetch_cancel.cancel();
                if failure.as_ref().map_or(true, Error::is_cancelled) {
                    failure = Some(e);
                }
            }
        }

        stop.cancel();
        if let Err(e) = ticker.await {
            warn!("Progress ticker died: {}", e);
        }
        self.check_cancel()?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
