use crate::events::EventSink;
use crate::range::RangeTask;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-range share of a [`ProgressSnapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct RangeShare {
    pub label: &'static str,
    pub percent: f64,
}

/// Point-in-time view of a transfer, regenerated on every tick
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub ranges: Vec<RangeShare>,
    pub total_bytes: u64,
}

impl ProgressSnapshot {
    pub fn capture(tasks: &[RangeTask]) -> Self {
        Self {
            ranges: tasks
                .iter()
                .map(|t| RangeShare {
                    label: t.route_label(),
                    percent: t.percent(),
                })
                .collect(),
            total_bytes: tasks.iter().map(|t| t.progress.downloaded()).sum(),
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, share) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{}: {:.1}%]", share.label, share.percent)?;
        }
        write!(f, " - {}MB", self.total_bytes / 1024 / 1024)
    }
}

/// Samples the running ranges every `interval` and forwards a snapshot to the sink.
///
/// The first snapshot goes out immediately. Returns once `stop` fires; no
/// snapshot is emitted after that point.
pub async fn aggregate(
    tasks: Arc<Vec<RangeTask>>,
    sink: EventSink,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if stop.is_cancelled() {
                    break;
                }
                sink.progress(ProgressSnapshot::capture(&tasks).to_string());
            }
        }
    }
    debug!("Progress aggregator stopped");
}
