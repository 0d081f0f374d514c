use crate::config::types::BackpressureStrategy;
use crate::queue::backpressure::BackpressureHandler;
use crate::record::Record;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Enqueue after the queue was closed. Callers must stop producing
    /// before shutdown; records offered afterwards are rejected, not kept.
    #[error("queue is closed")]
    Closed,

    #[error("queue is full")]
    Full,
}

/// Result of waiting on the queue for data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one record can be dequeued without waiting
    Ready,
    TimedOut,
    /// The queue is closed and fully drained
    Closed,
}

#[derive(Debug, Default)]
struct QueueStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStatsSnapshot {
    pub enqueued: u64,
    pub dequeued: u64,
    pub rejected: u64,
    pub pending: u64,
}

impl QueueStats {
    fn snapshot(&self) -> QueueStatsSnapshot {
        let enqueued = self.enqueued.load(Ordering::Relaxed);
        let dequeued = self.dequeued.load(Ordering::Relaxed);
        QueueStatsSnapshot {
            enqueued,
            dequeued,
            rejected: self.rejected.load(Ordering::Relaxed),
            pending: enqueued.saturating_sub(dequeued),
        }
    }
}

#[derive(Clone)]
enum Tx {
    Unbounded(mpsc::UnboundedSender<Record>),
    Bounded(mpsc::Sender<Record>, BackpressureStrategy),
}

enum Rx {
    Unbounded(mpsc::UnboundedReceiver<Record>),
    Bounded(mpsc::Receiver<Record>),
}

impl Rx {
    async fn recv(&mut self) -> Option<Record> {
        match self {
            Rx::Unbounded(rx) => rx.recv().await,
            Rx::Bounded(rx) => rx.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<Record> {
        match self {
            Rx::Unbounded(rx) => rx.try_recv().ok(),
            Rx::Bounded(rx) => rx.try_recv().ok(),
        }
    }

    fn close(&mut self) {
        match self {
            Rx::Unbounded(rx) => rx.close(),
            Rx::Bounded(rx) => rx.close(),
        }
    }
}

/// Producer side of the buffered queue. Cheap to clone; every producer
/// holds its own handle.
#[derive(Clone)]
pub struct BufferedQueue {
    tx: Tx,
    closed: CancellationToken,
    stats: Arc<QueueStats>,
}

/// Consumer side of the buffered queue.
///
/// There is exactly one receiver per queue, which is how the single-reader
/// requirement of the drain loop is enforced: it cannot be cloned.
pub struct QueueReceiver {
    rx: Rx,
    peeked: Option<Record>,
    closed: CancellationToken,
    rx_closed: bool,
    stats: Arc<QueueStats>,
}

/// Create a multi-producer, single-consumer record queue.
pub fn buffered_queue(handler: &BackpressureHandler) -> (BufferedQueue, QueueReceiver) {
    let (tx, rx) = match handler.channel_buffer_size() {
        Some(size) => {
            let (tx, rx) = mpsc::channel(size);
            (Tx::Bounded(tx, handler.strategy()), Rx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Tx::Unbounded(tx), Rx::Unbounded(rx))
        }
    };

    let closed = CancellationToken::new();
    let stats = Arc::new(QueueStats::default());

    (
        BufferedQueue {
            tx,
            closed: closed.clone(),
            stats: stats.clone(),
        },
        QueueReceiver {
            rx,
            peeked: None,
            closed,
            rx_closed: false,
            stats,
        },
    )
}

impl BufferedQueue {
    /// Offer a record to the queue.
    ///
    /// Unbounded queues never wait. Bounded queues either wait for space
    /// (`block`) or fail with [`QueueError::Full`] (`reject`).
    pub async fn enqueue(&self, record: Record) -> Result<(), QueueError> {
        let result = if self.closed.is_cancelled() {
            Err(QueueError::Closed)
        } else {
            match &self.tx {
                Tx::Unbounded(tx) => tx.send(record).map_err(|_| QueueError::Closed),
                Tx::Bounded(tx, BackpressureStrategy::Block) => {
                    tx.send(record).await.map_err(|_| QueueError::Closed)
                }
                Tx::Bounded(tx, BackpressureStrategy::Reject) => {
                    tx.try_send(record).map_err(|e| match e {
                        TrySendError::Full(_) => QueueError::Full,
                        TrySendError::Closed(_) => QueueError::Closed,
                    })
                }
            }
        };

        match result {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                if e == QueueError::Closed {
                    warn!("Record offered after queue close, rejecting");
                }
            }
        }

        result
    }

    /// Signal that no more records will be enqueued. The consumer still
    /// drains whatever was accepted before this call.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot()
    }
}

impl QueueReceiver {
    /// Pop one record without waiting
    pub fn try_dequeue(&mut self) -> Option<Record> {
        let record = self.peeked.take().or_else(|| self.rx.try_recv());
        if record.is_some() {
            self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        record
    }

    /// Suspend until a record is available, the timeout elapses, or the
    /// queue is closed and empty.
    pub async fn wait_for_data(&mut self, timeout: Duration) -> WaitOutcome {
        if self.peeked.is_some() {
            return WaitOutcome::Ready;
        }

        let deadline = Instant::now() + timeout;

        loop {
            tokio::select! {
                biased;

                item = self.rx.recv() => {
                    return match item {
                        Some(record) => {
                            self.peeked = Some(record);
                            WaitOutcome::Ready
                        }
                        None => WaitOutcome::Closed,
                    };
                }

                _ = self.closed.cancelled(), if !self.rx_closed => {
                    // Stop new sends; buffered records stay readable.
                    self.rx.close();
                    self.rx_closed = true;
                }

                _ = tokio::time::sleep_until(deadline) => {
                    return WaitOutcome::TimedOut;
                }
            }
        }
    }

    /// Close the queue from the consumer side. Producers are rejected from
    /// here on; records already accepted remain available to `try_dequeue`.
    pub fn close(&mut self) {
        self.closed.cancel();
        if !self.rx_closed {
            self.rx.close();
            self.rx_closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot()
    }
}
