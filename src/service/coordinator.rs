//! Upload coordinator
//!
//! Drives the per-file upload pipeline: bounded immediate retries on file
//! creation, deferral to the retry queue on exhaustion, and the periodic
//! sweep that re-attempts deferred files.

use crate::metrics;
use crate::upload::{self, RetryQueue, UploadOutcome, Uploader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Coordinates upload attempts against the retry budget and the queue.
///
/// The success counter includes uploads completed on the sweep path, so the
/// shutdown report counts every file that made it to the remote store.
pub struct UploadCoordinator {
    uploader: Arc<dyn Uploader>,
    queue: Arc<RetryQueue>,
    max_tries: u32,
    success_count: AtomicU64,
}

impl UploadCoordinator {
    pub fn new(uploader: Arc<dyn Uploader>, queue: Arc<RetryQueue>, max_tries: u32) -> Self {
        Self {
            uploader,
            queue,
            max_tries,
            success_count: AtomicU64::new(0),
        }
    }

    /// Total uploads confirmed by the remote store so far
    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    /// Whether any files are waiting for a deferred retry
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Snapshot of the deferred files in retry order
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.queue.paths()
    }

    /// Handle one file-created notification.
    ///
    /// Attempts the upload up to the configured budget, back to back, and
    /// stops at the first success. A confirmed upload deletes the local copy;
    /// an exhausted budget defers the file to the retry queue, leaving the
    /// local copy in place.
    pub async fn handle_created(&self, path: PathBuf) {
        for _ in 0..self.max_tries {
            if let UploadOutcome::Uploaded { public_id } = self.timed_attempt(&path).await {
                self.confirm_upload(&path, &public_id).await;
                return;
            }
        }

        tracing::warn!(
            path = %path.display(),
            tries = self.max_tries,
            "Deferring upload after exhausting immediate attempts"
        );
        if self.queue.push(path) {
            metrics::record_deferred_file();
        }
        metrics::set_retry_queue_depth(self.queue.len());
    }

    /// Run one deferred-retry sweep pass.
    ///
    /// Each entry present at pass start gets exactly one attempt; failures
    /// re-enter at the back of the queue. Bounding the pass keeps a queue of
    /// persistently failing files from turning the sweep into a hot loop.
    pub async fn sweep(&self) {
        let pending = self.queue.len();
        for _ in 0..pending {
            let Some(path) = self.queue.pop() else {
                break;
            };
            match self.timed_attempt(&path).await {
                UploadOutcome::Uploaded { public_id } => {
                    self.confirm_upload(&path, &public_id).await;
                }
                UploadOutcome::Failed => {
                    self.queue.push(path);
                }
            }
        }
        metrics::set_retry_queue_depth(self.queue.len());
        metrics::record_sweep();
    }

    async fn timed_attempt(&self, path: &Path) -> UploadOutcome {
        let started = Instant::now();
        let outcome = upload::attempt(self.uploader.as_ref(), path).await;
        let elapsed = started.elapsed().as_secs_f64();
        match outcome {
            UploadOutcome::Uploaded { .. } => metrics::record_upload_success(elapsed),
            UploadOutcome::Failed => metrics::record_upload_failure(elapsed),
        }
        outcome
    }

    async fn confirm_upload(&self, path: &Path, public_id: &str) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            public_id = %public_id,
            path = %path.display(),
            "Image uploaded"
        );

        // The upload is already confirmed remotely; a file we cannot delete
        // is an operator problem, not a service failure.
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not delete uploaded file"
            );
        }
    }
}
