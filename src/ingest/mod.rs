use crate::config::IngestMode;
use crate::queue::{BufferedQueue, QueueError};
use crate::record::Record;
use crate::remote::{RemoteQueue, RemoteQueueError};
use crate::storage::{RecordSink, StorageError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteQueueError),
}

/// How far an accepted record got before `submit` returned.
///
/// `Queued` is not a durability guarantee: the record is lost if the
/// process dies before the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitReceipt {
    Queued,
    Written,
}

/// Entry point that validates incoming content and routes it into the
/// buffering path selected by `ingest.mode`.
#[derive(Clone)]
pub enum IngestFront {
    /// Push into the in-process queue; a drain loop writes it later
    Batched(BufferedQueue),
    /// Append directly, serialized by the sink's lock
    Sync(Arc<dyn RecordSink>),
    /// Push into an external FIFO drained by another loop or process
    Remote(Arc<dyn RemoteQueue>),
}

impl IngestFront {
    pub fn mode(&self) -> IngestMode {
        match self {
            IngestFront::Batched(_) => IngestMode::Batched,
            IngestFront::Sync(_) => IngestMode::Sync,
            IngestFront::Remote(_) => IngestMode::Remote,
        }
    }

    pub async fn submit(&self, content: impl Into<String>) -> Result<SubmitReceipt, IngestError> {
        let content = content.into();
        validate_content(&content)?;

        let record = Record::new(content);
        match self {
            IngestFront::Batched(queue) => {
                queue.enqueue(record).await?;
                Ok(SubmitReceipt::Queued)
            }
            IngestFront::Sync(sink) => {
                let report = sink.append(std::slice::from_ref(&record)).await?;
                debug!(path = %report.path.display(), bytes = report.bytes, "Record written");
                Ok(SubmitReceipt::Written)
            }
            IngestFront::Remote(queue) => {
                queue.push(&record).await?;
                Ok(SubmitReceipt::Queued)
            }
        }
    }
}

fn validate_content(content: &str) -> Result<(), IngestError> {
    if content.trim().is_empty() {
        return Err(IngestError::Validation(
            "message content must not be empty".to_string(),
        ));
    }
    Ok(())
}
