use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of a drain loop.
///
/// Normal operation cycles `Running -> Draining -> Flushing -> Running`;
/// shutdown goes `Stopping -> FinalFlush -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    Running,
    Draining,
    Flushing,
    Stopping,
    FinalFlush,
    Stopped,
}

#[derive(Debug, Default)]
pub(crate) struct DrainStats {
    batches_flushed: AtomicU64,
    records_flushed: AtomicU64,
    records_dropped: AtomicU64,
    flush_failures: AtomicU64,
}

impl DrainStats {
    #[inline]
    pub(crate) fn record_flush(&self, records: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.records_flushed
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failure(&self, dropped: usize) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
        self.records_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DrainStatsSnapshot {
    pub state: DrainState,
    pub batches_flushed: u64,
    pub records_flushed: u64,
    pub records_dropped: u64,
    pub flush_failures: u64,
}

/// Read-only view of a running drain loop
#[derive(Debug, Clone)]
pub struct DrainHandle {
    state_rx: watch::Receiver<DrainState>,
    stats: Arc<DrainStats>,
}

impl DrainHandle {
    pub(crate) fn new(state_rx: watch::Receiver<DrainState>, stats: Arc<DrainStats>) -> Self {
        Self { state_rx, stats }
    }

    pub fn state(&self) -> DrainState {
        *self.state_rx.borrow()
    }

    pub fn stats(&self) -> DrainStatsSnapshot {
        DrainStatsSnapshot {
            state: self.state(),
            batches_flushed: self.stats.batches_flushed.load(Ordering::Relaxed),
            records_flushed: self.stats.records_flushed.load(Ordering::Relaxed),
            records_dropped: self.stats.records_dropped.load(Ordering::Relaxed),
            flush_failures: self.stats.flush_failures.load(Ordering::Relaxed),
        }
    }

    /// Resolve once the loop reports `Stopped`
    pub async fn stopped(&mut self) {
        let _ = self
            .state_rx
            .wait_for(|state| *state == DrainState::Stopped)
            .await;
    }
}

/// Create the shared state for a new drain loop
pub(crate) fn drain_state() -> (watch::Sender<DrainState>, DrainHandle, Arc<DrainStats>) {
    let (state_tx, state_rx) = watch::channel(DrainState::Running);
    let stats = Arc::new(DrainStats::default());
    (state_tx, DrainHandle::new(state_rx, stats.clone()), stats)
}
