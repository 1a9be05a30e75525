//! Recursive file system watcher using notify-rs.

#![allow(clippy::used_underscore_binding)]

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;

use super::events::{EventBatch, FileEvent};
use crate::error::WatcherError;
use crate::summary::is_artifact;
use crate::Result;

/// Debounce window for file events.
pub const DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Anything that yields debounced event batches.
pub trait EventSource: Send {
    /// Next batch, or `None` once the source is exhausted.
    fn next_batch(&mut self) -> impl Future<Output = Option<EventBatch>> + Send;
}

impl EventSource for mpsc::Receiver<EventBatch> {
    fn next_batch(&mut self) -> impl Future<Output = Option<EventBatch>> + Send {
        self.recv()
    }
}

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory watched recursively.
    pub root: PathBuf,
    /// Paths with any of these names as a component are dropped.
    pub ignore_dirs: Vec<String>,
    /// Paths containing any of these substrings are dropped.
    pub exclusions: Vec<String>,
    /// Debounce window.
    pub debounce: Duration,
}

impl WatcherConfig {
    /// Watch `root` with the default debounce window.
    pub fn new(root: impl AsRef<Path>, ignore_dirs: Vec<String>, exclusions: Vec<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ignore_dirs,
            exclusions,
            debounce: DEBOUNCE_DURATION,
        }
    }
}

/// Recursive watcher over one root.
///
/// Dropping it releases the OS watch.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    event_rx: mpsc::Receiver<EventBatch>,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `config.root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or cannot be watched.
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let root = config.root.clone();
        if !root.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let (batch_tx, event_rx) = mpsc::channel(100);
        let filter_root = root.clone();
        let rules = Exclusions {
            ignore_dirs: config.ignore_dirs.clone(),
            substrings: config.exclusions.clone(),
        };

        let mut debouncer = new_debouncer(
            config.debounce,
            move |result: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| {
                match result {
                    Ok(events) => {
                        let mut batch: EventBatch = events
                            .into_iter()
                            .filter(|event| matches!(event.kind, DebouncedEventKind::Any))
                            .map(|event| FileEvent::from_path(event.path))
                            .collect();
                        batch.retain(|p| !rules.excludes(&filter_root, p));

                        if !batch.is_empty() && batch_tx.blocking_send(batch).is_err() {
                            tracing::debug!("Event receiver closed, dropping batch");
                        }
                    }
                    Err(e) => {
                        tracing::error!("Watch error: {:?}", e);
                    }
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %root.display(), "Watching directory");

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
            root,
        })
    }

    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EventSource for FileWatcher {
    fn next_batch(&mut self) -> impl Future<Output = Option<EventBatch>> + Send {
        self.event_rx.recv()
    }
}

/// Rules deciding which watch events are dropped before reaching the pipeline.
///
/// Ignored directory names must match a whole component of the root-relative
/// path, as in the scan. Substrings match anywhere in it. Summary artifacts are
/// always dropped so writing one never triggers another event.
#[derive(Debug, Clone, Default)]
struct Exclusions {
    ignore_dirs: Vec<String>,
    substrings: Vec<String>,
}

impl Exclusions {
    fn excludes(&self, root: &Path, path: &Path) -> bool {
        if is_artifact(path) {
            return true;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        let in_ignored_dir = relative.components().any(|c| match c {
            Component::Normal(name) => self.ignore_dirs.iter().any(|d| name == d.as_str()),
            _ => false,
        });
        if in_ignored_dir {
            return true;
        }
        let relative = relative.to_string_lossy();
        self.substrings
            .iter()
            .any(|pattern| relative.contains(pattern.as_str()))
    }
}
