pub mod http;
pub mod memory;

use crate::record::Record;
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpRemoteQueue;
pub use memory::MemoryRemoteQueue;

#[derive(Debug, Error)]
pub enum RemoteQueueError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("remote queue returned error status {status}: {message}")]
    Status { status: u16, message: String },
}

/// An external FIFO of records shared by many processes.
///
/// Durability of the queue itself is the queue's concern. A record that has
/// been popped is owned by the caller; if the caller dies before writing it,
/// the record is gone.
#[async_trait]
pub trait RemoteQueue: Send + Sync {
    /// Append a record to the tail of the queue
    async fn push(&self, record: &Record) -> Result<(), RemoteQueueError>;

    /// Remove and return the record at the head of the queue, if any
    async fn pop(&self) -> Result<Option<Record>, RemoteQueueError>;
}
