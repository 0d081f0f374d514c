use crate::config::types::IngestConfig;
use crate::drain::state::{drain_state, DrainHandle, DrainState, DrainStats, DrainStatsSnapshot};
use crate::queue::{QueueReceiver, WaitOutcome};
use crate::record::Record;
use crate::storage::traits::RecordSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Flush failures in a row before the loop starts pausing between cycles
const BACKOFF_AFTER_FAILURES: u32 = 2;

#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Flush at least this often while records are waiting
    pub flush_interval: Duration,
    /// Flush as soon as this many records are batched
    pub max_batch_size: usize,
    /// Pause after repeated consecutive flush failures
    pub error_backoff: Duration,
}

impl DrainConfig {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            flush_interval: config.flush_interval(),
            max_batch_size: config.max_batch_size.max(1),
            error_backoff: config.error_backoff,
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

/// The single consumer of a [`BufferedQueue`](crate::queue::BufferedQueue).
///
/// Moves queued records into a batch and hands the batch to the sink when
/// either the flush interval has elapsed or the batch is full. Batches are
/// flushed strictly one after another, so file order equals dequeue order.
///
/// A batch whose flush fails is logged and dropped; the loop keeps going.
/// On cancellation the queue is closed, everything still in it is drained
/// and flushed, and only then does the loop stop.
pub struct BatchDrainLoop {
    receiver: QueueReceiver,
    sink: Arc<dyn RecordSink>,
    config: DrainConfig,
    cancel: CancellationToken,
    state_tx: watch::Sender<DrainState>,
    stats: Arc<DrainStats>,
    consecutive_failures: u32,
}

impl BatchDrainLoop {
    pub fn new(
        receiver: QueueReceiver,
        sink: Arc<dyn RecordSink>,
        config: DrainConfig,
        cancel: CancellationToken,
    ) -> (Self, DrainHandle) {
        let (state_tx, handle, stats) = drain_state();

        let drain = Self {
            receiver,
            sink,
            config,
            cancel,
            state_tx,
            stats,
            consecutive_failures: 0,
        };

        (drain, handle)
    }

    pub async fn run(mut self) -> DrainStatsSnapshot {
        info!(
            flush_interval_secs = self.config.flush_interval.as_secs(),
            max_batch_size = self.config.max_batch_size,
            "Batch drain loop started"
        );

        let mut batch: Vec<Record> = Vec::with_capacity(self.config.max_batch_size);
        let mut last_flush = Instant::now();

        loop {
            self.set_state(DrainState::Running);

            let remaining = self
                .config
                .flush_interval
                .saturating_sub(last_flush.elapsed());

            let outcome = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!("Batch drain loop received shutdown signal");
                    break;
                }

                outcome = self.receiver.wait_for_data(remaining) => outcome,
            };

            self.set_state(DrainState::Draining);
            self.drain_into(&mut batch);

            let interval_elapsed = last_flush.elapsed() >= self.config.flush_interval;
            if interval_elapsed || batch.len() >= self.config.max_batch_size {
                self.set_state(DrainState::Flushing);
                self.flush(&mut batch).await;
                last_flush = Instant::now();

                if self.consecutive_failures >= BACKOFF_AFTER_FAILURES {
                    debug!(
                        failures = self.consecutive_failures,
                        backoff_ms = self.config.error_backoff.as_millis() as u64,
                        "Backing off after repeated flush failures"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }

            if outcome == WaitOutcome::Closed {
                info!("Queue closed, stopping batch drain loop");
                break;
            }
        }

        self.set_state(DrainState::Stopping);
        self.receiver.close();

        self.set_state(DrainState::FinalFlush);
        let mut final_count = 0;
        loop {
            self.drain_into(&mut batch);
            if batch.is_empty() {
                break;
            }
            final_count += batch.len();
            self.flush(&mut batch).await;
        }

        if final_count > 0 {
            info!(count = final_count, "Final batch flush");
        }

        self.set_state(DrainState::Stopped);

        let snapshot = DrainHandle::new(self.state_tx.subscribe(), self.stats.clone()).stats();
        info!(
            records_flushed = snapshot.records_flushed,
            records_dropped = snapshot.records_dropped,
            "Batch drain loop stopped"
        );
        snapshot
    }

    /// Move available records into the batch without waiting, stopping once
    /// the batch is full.
    fn drain_into(&mut self, batch: &mut Vec<Record>) {
        while batch.len() < self.config.max_batch_size {
            match self.receiver.try_dequeue() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
    }

    /// Hand the batch to the sink. The batch is cleared whether or not the
    /// write succeeded.
    async fn flush(&mut self, batch: &mut Vec<Record>) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        match self.sink.append(batch.as_slice()).await {
            Ok(report) => {
                self.consecutive_failures = 0;
                self.stats.record_flush(count);
                debug!(
                    count = count,
                    path = %report.path.display(),
                    rotated = report.rotated,
                    "Flushed batch"
                );
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.stats.record_failure(count);
                error!(
                    count = count,
                    target = %self.sink.target_path().map(|p| p.display().to_string()).unwrap_or_default(),
                    path = %e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %e,
                    "Failed to flush batch, dropping records"
                );
            }
        }

        batch.clear();
    }

    fn set_state(&self, state: DrainState) {
        self.state_tx.send_replace(state);
    }
}

/// Spawn a batch drain loop on the current runtime
pub fn spawn_batch_drain(
    receiver: QueueReceiver,
    sink: Arc<dyn RecordSink>,
    config: DrainConfig,
    cancel: CancellationToken,
) -> (JoinHandle<DrainStatsSnapshot>, DrainHandle) {
    let (drain, handle) = BatchDrainLoop::new(receiver, sink, config, cancel);
    (tokio::spawn(drain.run()), handle)
}
