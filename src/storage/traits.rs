use crate::record::Record;
use async_trait::async_trait;
use std::path::PathBuf;

/// Destination for flushed records.
///
/// Implementations serialize concurrent callers themselves; an `append` call
/// either writes every record it was given or returns an error.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, records: &[Record]) -> Result<AppendReport, StorageError>;

    /// File an append issued now would target, for error reporting
    fn target_path(&self) -> Option<PathBuf> {
        None
    }
}

/// What a successful append did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReport {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: u64,
    pub rotated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create log directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} failed for '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Path the failing operation targeted, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            StorageError::CreateDir { path, .. } | StorageError::Io { path, .. } => Some(path),
            StorageError::Encode(_) => None,
        }
    }
}
