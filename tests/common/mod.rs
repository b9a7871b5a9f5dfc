//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use shutterlift::upload::{UploadError, UploadReceipt, Uploader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Uploader that confirms every attempt, deriving the public id from the
/// file stem the way the real service does with `use_filename`.
pub struct AcceptingUploader {
    pub attempts: AtomicU32,
}

impl AcceptingUploader {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Uploader for AcceptingUploader {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let public_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string());
        Ok(UploadReceipt { public_id })
    }
}

/// Uploader that refuses every attempt
pub struct RefusingUploader {
    pub attempts: AtomicU32,
}

impl RefusingUploader {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Uploader for RefusingUploader {
    async fn upload(&self, _path: &Path) -> Result<UploadReceipt, UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(UploadError::TransferError("connection refused".into()))
    }
}

/// Uploader that fails a fixed number of attempts, then confirms
pub struct FlakyUploader {
    failures_left: AtomicU32,
    pub attempts: AtomicU32,
}

impl FlakyUploader {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Uploader for FlakyUploader {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(UploadError::TransferError("timed out".into()));
        }
        Ok(UploadReceipt {
            public_id: path.display().to_string(),
        })
    }
}

/// Uploader that refuses a fixed set of file names and confirms the rest
pub struct SelectiveUploader {
    refused: HashSet<String>,
    pub accepted: Mutex<Vec<PathBuf>>,
}

impl SelectiveUploader {
    pub fn refusing(names: &[&str]) -> Self {
        Self {
            refused: names.iter().map(|name| name.to_string()).collect(),
            accepted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Uploader for SelectiveUploader {
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.refused.contains(&name) {
            return Err(UploadError::RemoteError("rejected".into()));
        }
        self.accepted.lock().unwrap().push(path.to_path_buf());
        Ok(UploadReceipt { public_id: name })
    }
}

/// Create a file with placeholder image bytes and return its path
pub fn drop_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\xff\xd8\xff\xe0 not really a jpeg").unwrap();
    path
}
