//! Upload module
//!
//! Defines the upload contract consumed by the coordinator: a single attempt
//! against the remote asset store, and the deferred-retry queue for files
//! that exhausted their immediate attempts.

use chrono::Utc;
use std::path::Path;
use thiserror::Error;

pub mod retry_queue;

pub use retry_queue::RetryQueue;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Transfer error: {0}")]
    TransferError(String),

    #[error("Remote rejected upload: {0}")]
    RemoteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Confirmation returned by the remote store for a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Identifier assigned by the remote store
    pub public_id: String,
}

/// Result of a single upload attempt
///
/// Failures carry no detail here: the coordinator treats every failed attempt
/// uniformly, retrying up to its budget and then deferring.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded { public_id: String },
    Failed,
}

/// Upload client trait
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    /// Upload a single local file, returning the remote receipt
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError>;
}

/// Perform one upload attempt for `path`.
///
/// Never returns an error: any transfer failure maps to
/// [`UploadOutcome::Failed`] and the caller owns the retry decision. Safe to
/// call repeatedly with the same path; the remote store assigns its own
/// public id per upload.
pub async fn attempt(uploader: &dyn Uploader, path: &Path) -> UploadOutcome {
    match uploader.upload(path).await {
        Ok(receipt) => UploadOutcome::Uploaded {
            public_id: receipt.public_id,
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                at = %Utc::now().to_rfc3339(),
                "Upload failed"
            );
            UploadOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_attempt_maps_receipt_to_uploaded() {
        let mut uploader = MockUploader::new();
        uploader.expect_upload().returning(|_| {
            Ok(UploadReceipt {
                public_id: "sample_photo".into(),
            })
        });

        let outcome = attempt(&uploader, &PathBuf::from("a.jpg")).await;
        assert_eq!(
            outcome,
            UploadOutcome::Uploaded {
                public_id: "sample_photo".into()
            }
        );
    }

    #[tokio::test]
    async fn test_attempt_maps_error_to_failed() {
        let mut uploader = MockUploader::new();
        uploader
            .expect_upload()
            .returning(|_| Err(UploadError::TransferError("connection reset".into())));

        let outcome = attempt(&uploader, &PathBuf::from("a.jpg")).await;
        assert_eq!(outcome, UploadOutcome::Failed);
    }
}
