use crate::config::{load_or_default, Config, IngestMode};
use crate::drain::{spawn_batch_drain, spawn_remote_drain, DrainConfig, DrainHandle, DrainStatsSnapshot};
use crate::ingest::IngestFront;
use crate::queue::{buffered_queue, BackpressureHandler, BufferedQueue};
use crate::remote::{HttpRemoteQueue, RemoteQueue};
use crate::storage::RotatingWriter;
use crate::web::{run_server, AppState};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("remote queue error: {0}")]
    Remote(#[from] crate::remote::RemoteQueueError),

    #[error("ingest mode 'remote' requires a 'remote' section")]
    MissingRemote,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    WebServer(#[from] std::io::Error),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), RunError> {
    match &config_path {
        Some(path) => info!(config_path = %path.display(), "Loading configuration"),
        None => warn!("No config file found, using built-in defaults"),
    }

    let config = load_or_default(config_path.as_deref())?;

    run_until(config, async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    })
    .await
}

/// The parts of a running service that shutdown has to stop, in order
struct Service {
    front: IngestFront,
    queue: Option<BufferedQueue>,
    drain: Option<(JoinHandle<DrainStatsSnapshot>, DrainHandle)>,
    writer: Arc<RotatingWriter>,
}

fn start_service(config: &Config, cancel: &CancellationToken) -> Result<Service, RunError> {
    // Failing to prepare the log directory aborts startup
    let writer = Arc::new(RotatingWriter::from_config(&config.logging)?);

    let service = match config.ingest.mode {
        IngestMode::Batched => {
            let handler = BackpressureHandler::from_config(&config.ingest.queue);
            let (queue, receiver) = buffered_queue(&handler);
            let drain = spawn_batch_drain(
                receiver,
                writer.clone(),
                DrainConfig::from_config(&config.ingest),
                cancel.clone(),
            );
            Service {
                front: IngestFront::Batched(queue.clone()),
                queue: Some(queue),
                drain: Some(drain),
                writer,
            }
        }
        IngestMode::Sync => Service {
            front: IngestFront::Sync(writer.clone()),
            queue: None,
            drain: None,
            writer,
        },
        IngestMode::Remote => {
            let remote_config = config.remote.as_ref().ok_or(RunError::MissingRemote)?;
            let remote: Arc<dyn RemoteQueue> = Arc::new(HttpRemoteQueue::new(remote_config)?);
            info!(url = %remote_config.url, key = %remote_config.key, "Using remote queue");
            let drain = spawn_remote_drain(
                remote.clone(),
                writer.clone(),
                remote_config.poll_interval,
                config.ingest.error_backoff,
                cancel.clone(),
            );
            Service {
                front: IngestFront::Remote(remote),
                queue: None,
                drain: Some(drain),
                writer,
            }
        }
    };

    Ok(service)
}

/// Run the service until `shutdown` resolves or the web server fails.
///
/// Shutdown stops the HTTP listener first, then closes the queue and lets
/// the drain loop flush whatever was accepted before returning.
pub async fn run_until<F>(config: Config, shutdown: F) -> Result<(), RunError>
where
    F: Future<Output = ()>,
{
    let cancel = CancellationToken::new();
    let service = start_service(&config, &cancel)?;

    let mut state = AppState::new(service.front.clone()).with_writer(service.writer.clone());
    if let Some((_, handle)) = &service.drain {
        state = state.with_drain(handle.clone());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let web_config = config.web.clone();
    let mut web_handle = tokio::spawn(run_server(state, web_config, shutdown_rx));

    info!(mode = ?config.ingest.mode, "logspool started, press Ctrl+C to shutdown");

    let mut web_result = None;
    tokio::select! {
        _ = shutdown => {}
        result = &mut web_handle => {
            web_result = Some(result);
        }
    }

    let _ = shutdown_tx.send(true);
    let web_result = match web_result {
        Some(result) => result,
        None => web_handle.await,
    };

    if let Some(queue) = &service.queue {
        queue.close();
    }
    cancel.cancel();

    if let Some((join, _)) = service.drain {
        let stats = join.await?;
        info!(
            records_flushed = stats.records_flushed,
            records_dropped = stats.records_dropped,
            flush_failures = stats.flush_failures,
            "Drain loop finished"
        );
    }

    let writer_stats = service.writer.stats();
    info!(
        records_written = writer_stats.records_written,
        rotations = writer_stats.rotations,
        "Shutdown complete"
    );

    web_result??;
    Ok(())
}
