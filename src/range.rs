use crate::network::{NetworkBinding, DEFAULT_ROUTE_LABEL};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Contiguous window of a remote resource, `len` bytes starting at `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inclusive last byte, `None` for an empty window
    pub fn last(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.start + self.len - 1)
        }
    }

    /// Formatted [`RANGE`][reqwest::header::RANGE] header value
    pub fn header_value(&self) -> Option<String> {
        self.last()
            .map(|last| format!("bytes={}-{}", self.start, last))
    }

    /// True when this window is the whole of a resource of `total` bytes
    pub fn covers(&self, total: u64) -> bool {
        self.start == 0 && self.len == total
    }

    /// Split `[0, total - 1]` at `total / 2`.
    ///
    /// The first window is `[0, total/2 - 1]`, the second `[total/2, total - 1]`.
    /// For `total == 1` the first window is empty.
    pub fn split_in_two(total: u64) -> [ByteRange; 2] {
        let mid = total / 2;
        [ByteRange::new(0, mid), ByteRange::new(mid, total - mid)]
    }
}

/// Live, shared view of how far a range got
#[derive(Debug, Default)]
pub struct RangeProgress {
    downloaded: AtomicU64,
    finished: AtomicBool,
}

impl RangeProgress {
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }
    pub(crate) fn add(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::AcqRel);
    }
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
    pub(crate) fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

/// One of the two ranges of a job, with its route and part file
#[derive(Debug, Clone)]
pub struct RangeTask {
    /// 1-based position, also the merge order
    pub pos: usize,
    pub range: ByteRange,
    pub binding: Option<NetworkBinding>,
    pub path: PathBuf,
    pub progress: Arc<RangeProgress>,
}

impl RangeTask {
    pub fn new(
        pos: usize,
        range: ByteRange,
        binding: Option<NetworkBinding>,
        path: PathBuf,
    ) -> Self {
        Self {
            pos,
            range,
            binding,
            path,
            progress: Arc::new(RangeProgress::default()),
        }
    }

    /// Route label, `Def` when riding the default route
    pub fn route_label(&self) -> &'static str {
        self.binding
            .as_ref()
            .map(NetworkBinding::label)
            .unwrap_or(DEFAULT_ROUTE_LABEL)
    }

    /// Tag used in per-range log lines
    pub fn tag(&self) -> String {
        format!("IF{}", self.pos)
    }

    /// Downloaded share of the window in percent, 0 for an empty window
    pub fn percent(&self) -> f64 {
        if self.range.is_empty() {
            0.0
        } else {
            self.progress.downloaded() as f64 / self.range.len as f64 * 100.0
        }
    }
}
