//! Recurring scheduler: clipboard polling and retention sweeps on one thread.

use crate::clipboard::ClipboardSource;
use crate::store::{HistoryStore, IngestOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info};

pub struct Watcher {
    store: Arc<HistoryStore>,
    source: Arc<dyn ClipboardSource>,
    poll_interval: Duration,
    retention_every: Duration,
}

impl Watcher {
    pub fn new(store: Arc<HistoryStore>, source: Arc<dyn ClipboardSource>) -> Self {
        Self {
            store,
            source,
            poll_interval: Duration::from_secs(1),
            retention_every: Duration::from_secs(3_600),
        }
    }

    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        self.poll_interval = every;
        self
    }

    pub fn with_retention_every(mut self, every: Duration) -> Self {
        self.retention_every = every;
        self
    }

    /// Treat whatever is on the clipboard right now as already seen.
    pub fn prime(&self) {
        let count = self.source.change_count();
        self.store.prime(count);
        debug!(change_count = count, "primed clipboard watcher");
    }

    /// One poll-then-ingest step. `None` when the clipboard had nothing.
    pub fn poll_once(&self) -> Option<IngestOutcome> {
        let snap = self.source.poll()?;
        let outcome = self
            .store
            .ingest(snap.kind, &snap.payload, snap.change_count);
        if let IngestOutcome::Added(id) = outcome {
            debug!(%id, change_count = snap.change_count, "watcher captured clip");
        }
        Some(outcome)
    }

    pub fn sweep(&self) -> usize {
        self.store.apply_retention(OffsetDateTime::now_utc())
    }

    /// Sweep once, then poll and sweep on their cadences until `stop` is set.
    pub fn run_until(&self, stop: &AtomicBool) {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            retention_secs = self.retention_every.as_secs(),
            "clipboard watcher started"
        );
        self.sweep();
        let mut last_sweep = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            self.poll_once();
            if last_sweep.elapsed() >= self.retention_every {
                self.sweep();
                last_sweep = Instant::now();
            }
            std::thread::sleep(self.poll_interval);
        }
        info!("clipboard watcher stopped");
    }

    pub fn spawn(self, stop: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("clipstack-watch".into())
            .spawn(move || self.run_until(&stop))
    }
}
