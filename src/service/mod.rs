//! Service module
//!
//! Owns the service lifecycle and the long-lived loop joining watcher
//! notifications, the deferred-retry sweep timer, and the shutdown signal.

use crate::cloudinary::{CloudinaryClient, CloudinaryClientConfig};
use crate::config::Config;
use crate::metrics::server::{MetricsServer, MetricsServerError};
use crate::upload::{RetryQueue, Uploader};
use crate::watcher::{DirectoryWatcher, WatcherError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

mod coordinator;

pub use coordinator::UploadCoordinator;

/// Service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to prepare watch directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    WatcherError(#[from] WatcherError),

    #[error("Upload client error: {0}")]
    ClientError(String),

    #[error("Watch event stream closed unexpectedly")]
    WatchStreamClosed,

    #[error("Metrics endpoint error: {0}")]
    MetricsError(#[from] MetricsServerError),
}

/// Service lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Handle for requesting service shutdown from another task
#[derive(Clone)]
pub struct ShutdownHandle {
    signal: Arc<Notify>,
}

impl ShutdownHandle {
    /// Ask the service to stop. Effective at any point of the lifecycle,
    /// including before the watch is established.
    pub fn shutdown(&self) {
        self.signal.notify_one();
    }
}

/// The watch-upload-retry service.
///
/// Construction wires the upload client and the coordinator; [`run`](Self::run)
/// drives the lifecycle until a shutdown request or a fatal watcher error.
pub struct Service {
    config: Config,
    coordinator: Arc<UploadCoordinator>,
    workers: Arc<Semaphore>,
    shutdown: Arc<Notify>,
    state: parking_lot::Mutex<ServiceState>,
}

impl Service {
    /// Create a service uploading through the configured Cloudinary account
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let client = CloudinaryClient::new(CloudinaryClientConfig::from(&config.cloudinary))
            .map_err(|e| ServiceError::ClientError(e.to_string()))?;
        Ok(Self::with_uploader(config, Arc::new(client)))
    }

    /// Create a service with a custom upload client.
    ///
    /// The seam used by tests; also the way to ship to a different asset
    /// store without touching the pipeline.
    pub fn with_uploader(config: Config, uploader: Arc<dyn Uploader>) -> Self {
        let queue = Arc::new(RetryQueue::new());
        let coordinator = Arc::new(UploadCoordinator::new(
            uploader,
            queue,
            config.retry.max_tries,
        ));
        let workers = Arc::new(Semaphore::new(config.worker.max_concurrent));

        Self {
            config,
            coordinator,
            workers,
            shutdown: Arc::new(Notify::new()),
            state: parking_lot::Mutex::new(ServiceState::Starting),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Handle that requests shutdown of a running service
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: self.shutdown.clone(),
        }
    }

    /// The coordinator driving uploads, exposed for inspection
    pub fn coordinator(&self) -> &Arc<UploadCoordinator> {
        &self.coordinator
    }

    /// Run the service until shutdown is requested or the watcher dies.
    ///
    /// The stop report is emitted on every exit path, including fatal
    /// watcher errors and shutdown during startup.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let outcome = self.serve().await;
        self.report_and_stop();
        outcome
    }

    async fn serve(&self) -> Result<(), ServiceError> {
        self.transition(ServiceState::Starting);

        let directory = self.config.watch.directory.clone();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| ServiceError::DirectoryError {
                path: directory.clone(),
                source,
            })?;

        let (watcher, created) =
            DirectoryWatcher::watch(&directory, &self.config.watch.pattern)?;

        let mut metrics_server = if self.config.metrics.enabled {
            let mut server = MetricsServer::new(self.config.metrics.port);
            let addr = server.start().await?;
            info!(address = %addr, "Metrics endpoint listening");
            Some(server)
        } else {
            None
        };

        info!(
            directory = %directory.display(),
            pattern = %self.config.watch.pattern,
            "Watch established"
        );
        self.transition(ServiceState::Running);

        let result = self.event_loop(created).await;

        drop(watcher);
        if let Some(ref mut server) = metrics_server {
            server.shutdown().await;
        }

        result
    }

    async fn event_loop(
        &self,
        mut created: mpsc::Receiver<PathBuf>,
    ) -> Result<(), ServiceError> {
        let sweep_period = Duration::from_millis(self.config.retry.sweep_interval_ms);
        let mut sweep =
            tokio::time::interval_at(tokio::time::Instant::now() + sweep_period, sweep_period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return Ok(()),
                maybe_path = created.recv() => match maybe_path {
                    Some(path) => self.spawn_handler(path),
                    // The notify thread dropped its sender: the watch is dead
                    // and no further files will ever be observed.
                    None => return Err(ServiceError::WatchStreamClosed),
                },
                _ = sweep.tick() => {
                    if self.coordinator.has_pending() {
                        self.coordinator.sweep().await;
                    }
                }
            }
        }
    }

    /// Hand one created file to the coordinator on its own task, gated by
    /// the worker pool so a creation burst cannot stall the watcher channel.
    fn spawn_handler(&self, path: PathBuf) {
        let coordinator = self.coordinator.clone();
        let workers = self.workers.clone();
        tokio::spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            coordinator.handle_created(path).await;
        });
    }

    fn report_and_stop(&self) {
        self.transition(ServiceState::Stopping);

        let remaining = self.coordinator.pending_paths();
        if !remaining.is_empty() {
            let listing = remaining
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            warn!(count = remaining.len(), "Still-failing uploads:\n{listing}");
        }
        info!(
            total_uploaded = self.coordinator.success_count(),
            "Service stopped"
        );

        self.transition(ServiceState::Stopped);
    }

    fn transition(&self, next: ServiceState) {
        let mut state = self.state.lock();
        if *state != next {
            tracing::debug!(from = ?*state, to = ?next, "Service state change");
            *state = next;
        }
    }
}
