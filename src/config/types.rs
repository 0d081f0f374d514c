use crate::record::RecordFormat;
use crate::storage::rotating::RotationUnit;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub remote: Option<RemoteConfig>,
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_directory: PathBuf,
    pub max_file_size_mb: u64,
    pub backup_count: u32,
    pub rotation: RotationUnit,
    pub format: RecordFormat,
    pub fsync: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
            max_file_size_mb: 5,
            backup_count: 3,
            rotation: RotationUnit::Daily,
            format: RecordFormat::Plain,
            fsync: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Producers enqueue; one drain loop flushes batches
    #[default]
    Batched,
    /// Producers append directly under the writer lock
    Sync,
    /// Producers push to a remote queue; a drain loop pops and appends
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub mode: IngestMode,
    pub flush_interval_seconds: u64,
    pub max_batch_size: usize,
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
    pub queue: QueueConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::Batched,
            flush_interval_seconds: 5,
            max_batch_size: 500,
            error_backoff: Duration::from_secs(2),
            queue: QueueConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Unset means unbounded
    pub capacity: Option<usize>,
    pub backpressure: BackpressureStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureStrategy {
    /// Wait for space in a bounded queue
    #[default]
    Block,
    /// Fail the enqueue when a bounded queue is full
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default = "default_remote_key")]
    pub key: String,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_remote_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_remote_key() -> String {
    "logQueue".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_remote_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7100".to_string(),
        }
    }
}
