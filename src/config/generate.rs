pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGSPOOL CONFIGURATION
# =============================================================================
# Every section and field is optional; omitted values use the defaults shown.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logspool/config.yml
#   3. /etc/logspool/config.yml

# =============================================================================
# LOG FILES
# =============================================================================
# Records go to <log_directory>/<rotation key>.log. When the active file reaches
# max_file_size_mb, it is renamed to .1, older backups shift up by one and the
# oldest beyond backup_count is deleted.

logging:
  log_directory: logs
  max_file_size_mb: 5
  backup_count: 3
  # Rotation key granularity (UTC): daily | hourly
  rotation: daily
  # Line format: plain ("[<timestamp>] <content>") | json
  format: plain
  # Call fsync after each append
  fsync: false

# =============================================================================
# INGESTION
# =============================================================================
# mode:
#   batched  records are queued in memory and flushed in batches (default)
#   sync     every request appends directly to the log file
#   remote   records are pushed to a remote queue and drained from it
#
# A batch is flushed when flush_interval_seconds have passed since the last
# flush or when max_batch_size records are waiting, whichever comes first.

ingest:
  mode: batched
  flush_interval_seconds: 5
  max_batch_size: 500
  # Pause after repeated flush failures
  error_backoff: 2s
  queue:
    # Leave unset for an unbounded queue
    # capacity: 100000
    # Bounded queues only: block | reject
    backpressure: block

# =============================================================================
# REMOTE QUEUE (required for mode: remote)
# =============================================================================
# remote:
#   url: http://queue-service:7200
#   key: logQueue
#   poll_interval: 100ms
#   timeout: 10s

# =============================================================================
# HTTP INGRESS
# =============================================================================
web:
  listen: 127.0.0.1:7100
"#
    .to_string()
}
