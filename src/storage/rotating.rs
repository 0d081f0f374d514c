use super::traits::{AppendReport, RecordSink, StorageError};
use crate::config::types::LoggingConfig;
use crate::record::{Record, RecordFormat};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Granularity of the rotation key that names the active file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationUnit {
    /// `YYYY-MM-DD.log`
    #[default]
    Daily,
    /// `YYYY-MM-DD-HH.log`
    Hourly,
}

impl RotationUnit {
    pub fn key_for(&self, now: DateTime<Utc>) -> String {
        match self {
            RotationUnit::Daily => now.format("%Y-%m-%d").to_string(),
            RotationUnit::Hourly => now.format("%Y-%m-%d-%H").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the active file is at or above this many bytes
    pub max_size_bytes: u64,
    /// Number of `.N` generations kept; `.1` is the newest
    pub backup_count: u32,
    pub unit: RotationUnit,
}

impl RotationPolicy {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes(),
            backup_count: config.backup_count,
            unit: config.rotation,
        }
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_config(&LoggingConfig::default())
    }
}

#[derive(Debug, Default)]
struct WriterStats {
    appends: AtomicU64,
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    rotations: AtomicU64,
    write_errors: AtomicU64,
    active_size: AtomicU64,
    active_path: StdMutex<Option<PathBuf>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WriterStatsSnapshot {
    pub appends: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub rotations: u64,
    pub write_errors: u64,
    pub active_path: Option<PathBuf>,
    pub active_size: u64,
}

/// Appends records to size-bounded, rotating log files.
///
/// Files live at `<dir>/<key>.log` with backups `<dir>/<key>.log.1 .. .N`.
/// Checking the size, rotating and appending happen under one async lock, so
/// two callers can never both decide to rotate, and nobody writes into a file
/// that is being renamed.
pub struct RotatingWriter {
    directory: PathBuf,
    policy: RotationPolicy,
    format: RecordFormat,
    fsync: bool,
    lock: Mutex<()>,
    stats: WriterStats,
}

impl RotatingWriter {
    /// Create the writer, creating the log directory if needed.
    ///
    /// Failing to create the directory is the one unrecoverable error.
    pub fn new(
        directory: impl Into<PathBuf>,
        policy: RotationPolicy,
        format: RecordFormat,
    ) -> Result<Self, StorageError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| StorageError::CreateDir {
            path: directory.clone(),
            source,
        })?;

        info!(
            directory = %directory.display(),
            max_size_bytes = policy.max_size_bytes,
            backup_count = policy.backup_count,
            "Log directory ready"
        );

        Ok(Self {
            directory,
            policy,
            format,
            fsync: false,
            lock: Mutex::new(()),
            stats: WriterStats::default(),
        })
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self, StorageError> {
        Ok(Self::new(
            &config.log_directory,
            RotationPolicy::from_config(config),
            config.format,
        )?
        .with_fsync(config.fsync))
    }

    /// Call `sync_data` after every append
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Active file path for the rotation unit containing `now`
    pub fn active_path_at(&self, now: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("{}.log", self.policy.unit.key_for(now)))
    }

    /// Append records to the active file for the current time
    pub async fn append(&self, records: &[Record]) -> Result<AppendReport, StorageError> {
        self.append_at(records, Utc::now()).await
    }

    /// Append records to the active file for the rotation unit containing
    /// `now`, rotating first if that file already reached the size limit.
    ///
    /// All records are written with a single write. An empty slice does no
    /// I/O at all.
    pub async fn append_at(
        &self,
        records: &[Record],
        now: DateTime<Utc>,
    ) -> Result<AppendReport, StorageError> {
        let path = self.active_path_at(now);

        if records.is_empty() {
            return Ok(AppendReport {
                path,
                records: 0,
                bytes: 0,
                rotated: false,
            });
        }

        let buf = self.format.encode(records)?;

        let _guard = self.lock.lock().await;
        match self.rotate_and_append(&path, &buf).await {
            Ok((rotated, size)) => {
                self.stats.appends.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .records_written
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                self.stats
                    .bytes_written
                    .fetch_add(buf.len() as u64, Ordering::Relaxed);
                self.stats.active_size.store(size, Ordering::Relaxed);
                if let Ok(mut active) = self.stats.active_path.lock() {
                    *active = Some(path.clone());
                }

                debug!(
                    path = %path.display(),
                    records = records.len(),
                    bytes = buf.len(),
                    "Appended records"
                );

                Ok(AppendReport {
                    path,
                    records: records.len(),
                    bytes: buf.len() as u64,
                    rotated,
                })
            }
            Err(e) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    // Caller must hold `self.lock`.
    async fn rotate_and_append(&self, path: &Path, buf: &[u8]) -> Result<(bool, u64), StorageError> {
        let rotated = self.rotate_if_needed(path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| StorageError::io("open", path, e))?;

        file.write_all(buf)
            .await
            .map_err(|e| StorageError::io("append", path, e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io("append", path, e))?;

        if self.fsync {
            file.sync_data()
                .await
                .map_err(|e| StorageError::io("sync", path, e))?;
        }

        let size = file
            .metadata()
            .await
            .map_err(|e| StorageError::io("metadata", path, e))?
            .len();

        Ok((rotated, size))
    }

    // Caller must hold `self.lock`.
    async fn rotate_if_needed(&self, path: &Path) -> Result<bool, StorageError> {
        let size = match fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StorageError::io("metadata", path, e)),
        };

        if size < self.policy.max_size_bytes {
            return Ok(false);
        }

        let count = self.policy.backup_count;

        if count == 0 {
            fs::remove_file(path)
                .await
                .map_err(|e| StorageError::io("remove", path, e))?;
        } else {
            for i in (1..=count).rev() {
                let src = backup_path(path, i);
                let exists = fs::try_exists(&src)
                    .await
                    .map_err(|e| StorageError::io("metadata", &src, e))?;
                if !exists {
                    continue;
                }

                if i == count {
                    fs::remove_file(&src)
                        .await
                        .map_err(|e| StorageError::io("remove", &src, e))?;
                } else {
                    let dest = backup_path(path, i + 1);
                    fs::rename(&src, &dest)
                        .await
                        .map_err(|e| StorageError::io("rename", &src, e))?;
                }
            }

            fs::rename(path, backup_path(path, 1))
                .await
                .map_err(|e| StorageError::io("rename", path, e))?;
        }

        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
        info!(
            path = %path.display(),
            size = size,
            backup_count = count,
            "Rotated log file"
        );

        Ok(true)
    }

    pub fn stats(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            appends: self.stats.appends.load(Ordering::Relaxed),
            records_written: self.stats.records_written.load(Ordering::Relaxed),
            bytes_written: self.stats.bytes_written.load(Ordering::Relaxed),
            rotations: self.stats.rotations.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
            active_path: self
                .stats
                .active_path
                .lock()
                .ok()
                .and_then(|p| p.clone()),
            active_size: self.stats.active_size.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RecordSink for RotatingWriter {
    async fn append(&self, records: &[Record]) -> Result<AppendReport, StorageError> {
        RotatingWriter::append(self, records).await
    }

    fn target_path(&self) -> Option<PathBuf> {
        Some(self.active_path_at(Utc::now()))
    }
}

/// `<path>.<generation>`
pub fn backup_path(path: &Path, generation: u32) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", generation));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    // "[2026-01-28T10:00:00.000000Z] " is 30 bytes, plus content and newline
    const PREFIX_LEN: u64 = 30;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 10, 0, 0).unwrap()
    }

    fn record(content: &str) -> Record {
        Record::with_timestamp(at(28), content)
    }

    fn writer(dir: &Path, max_size_bytes: u64, backup_count: u32) -> RotatingWriter {
        let policy = RotationPolicy {
            max_size_bytes,
            backup_count,
            unit: RotationUnit::Daily,
        };
        RotatingWriter::new(dir, policy, RecordFormat::Plain).unwrap()
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_rotation_keys() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 4, 7, 30, 0).unwrap();
        assert_eq!(RotationUnit::Daily.key_for(ts), "2026-03-04");
        assert_eq!(RotationUnit::Hourly.key_for(ts), "2026-03-04-07");
    }

    #[test]
    fn test_backup_path() {
        let path = Path::new("/var/log/app/2026-01-28.log");
        assert_eq!(
            backup_path(path, 3),
            PathBuf::from("/var/log/app/2026-01-28.log.3")
        );
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("logs");
        writer(&dir, 1024, 3);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_directory_creation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let result = RotatingWriter::new(
            blocker.join("logs"),
            RotationPolicy::default(),
            RecordFormat::Plain,
        );
        assert!(matches!(result, Err(StorageError::CreateDir { .. })));
    }

    #[tokio::test]
    async fn test_append_writes_lines_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1024 * 1024, 3);

        let report = writer
            .append_at(&[record("one"), record("two")], at(28))
            .await
            .unwrap();

        assert_eq!(report.records, 2);
        assert!(!report.rotated);
        assert_eq!(report.path, temp_dir.path().join("2026-01-28.log"));
        assert_eq!(
            read(&report.path),
            "[2026-01-28T10:00:00.000000Z] one\n[2026-01-28T10:00:00.000000Z] two\n"
        );
    }

    #[tokio::test]
    async fn test_empty_append_does_no_io() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1024, 3);

        let report = writer.append_at(&[], at(28)).await.unwrap();
        assert_eq!(report.records, 0);
        assert!(!report.path.exists());
        assert_eq!(writer.stats().appends, 0);
    }

    #[tokio::test]
    async fn test_no_rotation_below_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 10_000, 3);

        for i in 0..20 {
            let report = writer
                .append_at(&[record(&format!("msg {}", i))], at(28))
                .await
                .unwrap();
            assert!(!report.rotated);
        }

        let active = temp_dir.path().join("2026-01-28.log");
        assert!(!backup_path(&active, 1).exists());
        assert_eq!(read(&active).lines().count(), 20);
        assert_eq!(writer.stats().rotations, 0);
    }

    #[tokio::test]
    async fn test_size_trigger_rotates_before_write() {
        let temp_dir = TempDir::new().unwrap();
        // One 70-byte line fills the file
        let writer = writer(temp_dir.path(), 70, 3);
        let content = "x".repeat((70 - PREFIX_LEN - 1) as usize);

        let first = writer.append_at(&[record(&content)], at(28)).await.unwrap();
        assert!(!first.rotated);
        assert_eq!(std::fs::metadata(&first.path).unwrap().len(), 70);

        let second = writer.append_at(&[record("fresh")], at(28)).await.unwrap();
        assert!(second.rotated);

        let backup = read(&backup_path(&second.path, 1));
        assert!(backup.ends_with(&format!("{}\n", content)));
        assert_eq!(read(&second.path), "[2026-01-28T10:00:00.000000Z] fresh\n");
    }

    #[tokio::test]
    async fn test_backup_chain_is_bounded_and_shifts() {
        let temp_dir = TempDir::new().unwrap();
        // Every append fills the file, so each subsequent append rotates
        let writer = writer(temp_dir.path(), 1, 2);
        let active = temp_dir.path().join("2026-01-28.log");

        for generation in 0..5 {
            writer
                .append_at(&[record(&format!("gen-{}", generation))], at(28))
                .await
                .unwrap();
        }

        assert!(read(&active).contains("gen-4"));
        assert!(read(&backup_path(&active, 1)).contains("gen-3"));
        assert!(read(&backup_path(&active, 2)).contains("gen-2"));
        assert!(!backup_path(&active, 3).exists());
        assert_eq!(writer.stats().rotations, 4);
    }

    #[tokio::test]
    async fn test_zero_backups_discards_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1, 0);
        let active = temp_dir.path().join("2026-01-28.log");

        writer.append_at(&[record("old")], at(28)).await.unwrap();
        let report = writer.append_at(&[record("new")], at(28)).await.unwrap();

        assert!(report.rotated);
        assert!(!backup_path(&active, 1).exists());
        assert_eq!(read(&active), "[2026-01-28T10:00:00.000000Z] new\n");
    }

    #[tokio::test]
    async fn test_new_rotation_key_starts_fresh_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1, 3);

        let day1 = writer.append_at(&[record("day one")], at(27)).await.unwrap();
        let day2 = writer.append_at(&[record("day two")], at(28)).await.unwrap();

        assert_ne!(day1.path, day2.path);
        assert!(!day2.rotated);
        assert!(!backup_path(&day1.path, 1).exists());
        assert!(!backup_path(&day2.path, 1).exists());
        assert!(read(&day1.path).contains("day one"));
        assert!(read(&day2.path).contains("day two"));
    }

    #[tokio::test]
    async fn test_existing_backups_shift_by_one() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1, 3);
        let active = temp_dir.path().join("2026-01-28.log");

        std::fs::write(&active, "current\n").unwrap();
        std::fs::write(backup_path(&active, 2), "stray\n").unwrap();

        writer.append_at(&[record("next")], at(28)).await.unwrap();

        assert_eq!(read(&backup_path(&active, 1)), "current\n");
        assert_eq!(read(&backup_path(&active, 3)), "stray\n");
        assert!(!backup_path(&active, 2).exists());
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1024 * 1024, 3);
        let active = temp_dir.path().join("2026-01-28.log");
        std::fs::create_dir(&active).unwrap();

        let result = writer.append_at(&[record("blocked")], at(28)).await;

        match result {
            Err(StorageError::Io { op, path, .. }) => {
                assert_eq!(op, "open");
                assert_eq!(path, active);
            }
            other => panic!("expected open failure, got {:?}", other),
        }
        let stats = writer.stats();
        assert_eq!(stats.write_errors, 1);
        assert_eq!(stats.appends, 0);
        assert_eq!(stats.records_written, 0);
    }

    #[tokio::test]
    async fn test_rotation_failure_is_reported_and_keeps_active_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1, 1);
        let active = temp_dir.path().join("2026-01-28.log");

        writer.append_at(&[record("full")], at(28)).await.unwrap();

        // The oldest backup slot is a non-empty directory, so it cannot be removed
        let oldest = backup_path(&active, 1);
        std::fs::create_dir(&oldest).unwrap();
        std::fs::write(oldest.join("keep"), "x").unwrap();

        let result = writer.append_at(&[record("next")], at(28)).await;

        match result {
            Err(StorageError::Io { op, path, .. }) => {
                assert_eq!(op, "remove");
                assert_eq!(path, oldest);
            }
            other => panic!("expected remove failure, got {:?}", other),
        }
        assert_eq!(writer.stats().write_errors, 1);
        assert_eq!(writer.stats().rotations, 0);
        assert_eq!(read(&active), "[2026-01-28T10:00:00.000000Z] full\n");
    }

    #[test]
    fn test_target_path_is_current_active_file() {
        let temp_dir = TempDir::new().unwrap();
        let writer = writer(temp_dir.path(), 1024, 3);

        let target = RecordSink::target_path(&writer).unwrap();
        assert_eq!(target.parent().unwrap(), temp_dir.path());
        assert!(target.to_string_lossy().ends_with(".log"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_keep_chain_contiguous() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Arc::new(writer(temp_dir.path(), 400, 3));
        let active = temp_dir.path().join("2026-01-28.log");

        let mut handles = Vec::new();
        for producer in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    writer
                        .append_at(&[record(&format!("p{}-{}", producer, i))], at(28))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let backups: Vec<u32> = (1..=10)
            .filter(|i| backup_path(&active, *i).exists())
            .collect();
        assert_eq!(backups, vec![1, 2, 3]);

        for path in std::iter::once(active.clone()).chain(backups.iter().map(|i| backup_path(&active, *i))) {
            for line in read(&path).lines() {
                assert!(line.starts_with("[2026-01-28T10:00:00.000000Z] p"), "torn line: {}", line);
            }
        }
        assert_eq!(writer.stats().records_written, 400);
    }
}
