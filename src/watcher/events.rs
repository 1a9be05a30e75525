//! Watch event types and batching.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// A debounced change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Created or written; the path exists.
    Changed(PathBuf),
    /// The path no longer exists.
    Removed(PathBuf),
}

impl FileEvent {
    /// Classify a debounced path by whether it still exists.
    #[must_use]
    pub fn from_path(path: PathBuf) -> Self {
        if path.exists() {
            Self::Changed(path)
        } else {
            Self::Removed(path)
        }
    }
}

/// Events collected within one debounce window.
///
/// Each path appears at most once; the latest event for a path wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventBatch {
    /// Paths to re-check and summarize if changed.
    pub changed: Vec<PathBuf>,
    /// Paths that disappeared.
    pub removed: Vec<PathBuf>,
}

impl EventBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event, replacing any earlier event for the same path.
    pub fn add(&mut self, event: FileEvent) {
        match event {
            FileEvent::Changed(path) => {
                self.removed.retain(|p| p != &path);
                if !self.changed.contains(&path) {
                    self.changed.push(path);
                }
            }
            FileEvent::Removed(path) => {
                self.changed.retain(|p| p != &path);
                if !self.removed.contains(&path) {
                    self.removed.push(path);
                }
            }
        }
    }

    /// Keep only paths for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.changed.retain(|p| keep(p));
        self.removed.retain(|p| keep(p));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len() + self.removed.len()
    }
}

impl FromIterator<FileEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = FileEvent>>(iter: I) -> Self {
        let mut batch = Self::new();
        for event in iter {
            batch.add(event);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_path_uses_existence() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("a.js");
        std::fs::write(&present, "x").unwrap();
        let absent = tmp.path().join("b.js");

        assert_eq!(
            FileEvent::from_path(present.clone()),
            FileEvent::Changed(present.clone())
        );
        assert_eq!(
            FileEvent::from_path(absent.clone()),
            FileEvent::Removed(absent)
        );
    }

    #[test]
    fn test_batch_dedups_changes() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Changed(PathBuf::from("/a.js")));
        batch.add(FileEvent::Changed(PathBuf::from("/b.js")));
        batch.add(FileEvent::Changed(PathBuf::from("/a.js")));

        assert_eq!(batch.changed.len(), 2);
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_latest_event_wins() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Changed(PathBuf::from("/a.js")));
        batch.add(FileEvent::Removed(PathBuf::from("/a.js")));
        assert!(batch.changed.is_empty());
        assert_eq!(batch.removed, vec![PathBuf::from("/a.js")]);

        batch.add(FileEvent::Changed(PathBuf::from("/a.js")));
        assert_eq!(batch.changed, vec![PathBuf::from("/a.js")]);
        assert!(batch.removed.is_empty());
    }

    #[test]
    fn test_retain_and_len() {
        let mut batch: EventBatch = [
            FileEvent::Changed(PathBuf::from("/p/src/a.js")),
            FileEvent::Changed(PathBuf::from("/p/node_modules/x.js")),
            FileEvent::Removed(PathBuf::from("/p/src/b.js")),
        ]
        .into_iter()
        .collect();
        assert_eq!(batch.len(), 3);

        batch.retain(|p| !p.to_string_lossy().contains("node_modules"));
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());

        batch.retain(|_| false);
        assert!(batch.is_empty());
    }
}
