//! Directory watcher module
//!
//! Bridges filesystem "file created" notifications into a channel of paths
//! for the coordinator. The underlying watch is registered once and stays
//! alive for as long as the returned handle does.

use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the event channel between the notify thread and the service
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Watcher errors
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Invalid watch pattern '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    #[error("Failed to establish watch: {0}")]
    NotifyError(#[from] notify::Error),
}

/// Handle for an established directory watch.
///
/// Dropping the handle releases the watch; the paired receiver then drains
/// and closes.
pub struct DirectoryWatcher {
    // Held for its Drop side effect: the OS watch is released with it.
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `directory` for created files matching `pattern`.
    ///
    /// Returns the watch handle and the receiving end of the created-file
    /// stream. Only the file name is matched against the pattern, so
    /// `*.jpg` picks up `a.jpg` anywhere under the directory.
    pub fn watch(
        directory: &Path,
        pattern: &str,
    ) -> Result<(Self, mpsc::Receiver<PathBuf>), WatcherError> {
        let pattern = Pattern::new(pattern).map_err(|e| WatcherError::PatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                for path in created_paths(&pattern, res) {
                    // The receiver half closing means the service is
                    // stopping; nothing left to deliver to.
                    let _ = event_tx.blocking_send(path);
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        Ok((Self { _watcher: watcher }, event_rx))
    }
}

/// Extract the created-file paths we care about from one notify callback.
fn created_paths(pattern: &Pattern, res: notify::Result<Event>) -> Vec<PathBuf> {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Watch event error");
            return Vec::new();
        }
    };

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(|path| matches_pattern(pattern, path))
            .collect(),
        _ => Vec::new(),
    }
}

fn matches_pattern(pattern: &Pattern, path: &Path) -> bool {
    path.file_name()
        .map(|name| pattern.matches(&name.to_string_lossy()))
        .unwrap_or(false)
}
