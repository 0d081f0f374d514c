use crate::drain::state::{drain_state, DrainHandle, DrainState, DrainStats, DrainStatsSnapshot};
use crate::remote::RemoteQueue;
use crate::storage::traits::RecordSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const BACKOFF_AFTER_FAILURES: u32 = 2;

/// Drains a [`RemoteQueue`] into a sink one record at a time.
///
/// When the queue is empty the loop sleeps for `poll_interval`. Cancellation
/// is honoured between records: a pop in flight is finished and its record
/// written first. There is no final drain; whatever is still queued remotely
/// stays there for the next consumer.
pub struct RemoteDrainLoop {
    queue: Arc<dyn RemoteQueue>,
    sink: Arc<dyn RecordSink>,
    poll_interval: Duration,
    error_backoff: Duration,
    cancel: CancellationToken,
    state_tx: watch::Sender<DrainState>,
    stats: Arc<DrainStats>,
}

impl RemoteDrainLoop {
    pub fn new(
        queue: Arc<dyn RemoteQueue>,
        sink: Arc<dyn RecordSink>,
        poll_interval: Duration,
        error_backoff: Duration,
        cancel: CancellationToken,
    ) -> (Self, DrainHandle) {
        let (state_tx, handle, stats) = drain_state();

        let drain = Self {
            queue,
            sink,
            poll_interval,
            error_backoff,
            cancel,
            state_tx,
            stats,
        };

        (drain, handle)
    }

    pub async fn run(self) -> DrainStatsSnapshot {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Remote drain loop started"
        );

        let mut consecutive_failures: u32 = 0;

        while !self.cancel.is_cancelled() {
            self.state_tx.send_replace(DrainState::Running);

            // A started pop always runs to completion: the remote side may
            // already have handed the record over.
            let pause = match self.queue.pop().await {
                Ok(Some(record)) => {
                    self.state_tx.send_replace(DrainState::Flushing);
                    match self.sink.append(std::slice::from_ref(&record)).await {
                        Ok(report) => {
                            consecutive_failures = 0;
                            self.stats.record_flush(1);
                            debug!(path = %report.path.display(), "Wrote remote record");
                            None
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            self.stats.record_failure(1);
                            error!(
                                count = 1,
                                target = %self.sink.target_path().map(|p| p.display().to_string()).unwrap_or_default(),
                                path = %e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                                error = %e,
                                "Failed to write remote record, dropping it"
                            );
                            (consecutive_failures >= BACKOFF_AFTER_FAILURES)
                                .then_some(self.error_backoff)
                        }
                    }
                }
                Ok(None) => Some(self.poll_interval),
                Err(e) => {
                    warn!(error = %e, "Failed to pop from remote queue");
                    Some(self.poll_interval.max(self.error_backoff))
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        self.state_tx.send_replace(DrainState::Stopping);
        self.state_tx.send_replace(DrainState::Stopped);

        let snapshot = DrainHandle::new(self.state_tx.subscribe(), self.stats.clone()).stats();
        info!(
            records_flushed = snapshot.records_flushed,
            records_dropped = snapshot.records_dropped,
            "Remote drain loop stopped"
        );
        snapshot
    }
}

/// Spawn a remote drain loop on the current runtime
pub fn spawn_remote_drain(
    queue: Arc<dyn RemoteQueue>,
    sink: Arc<dyn RecordSink>,
    poll_interval: Duration,
    error_backoff: Duration,
    cancel: CancellationToken,
) -> (JoinHandle<DrainStatsSnapshot>, DrainHandle) {
    let (drain, handle) = RemoteDrainLoop::new(queue, sink, poll_interval, error_backoff, cancel);
    (tokio::spawn(drain.run()), handle)
}
