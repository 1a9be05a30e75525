//! Change classification against the record store.
//!
//! Classification compares content hashes only. A touched file with the same
//! bytes stays `Unchanged`; an edit that keeps the old mtime is `Modified`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::storage::{RecordStore, StoredFingerprint};
use crate::Result;

/// How a path relates to its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    /// Stored hash matches the current content.
    Unchanged,
    /// No record exists for the path.
    New,
    /// A record exists with a different hash.
    Modified,
    /// A record exists but the file is gone from disk.
    Deleted,
}

impl Change {
    /// Whether the path needs a new summary.
    #[must_use]
    pub const fn needs_summary(self) -> bool {
        matches!(self, Self::New | Self::Modified)
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unchanged => "unchanged",
            Self::New => "new",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Classify a live file against its stored fingerprint, if any.
#[must_use]
pub fn classify(current_hash: &str, stored: Option<&StoredFingerprint>) -> Change {
    match stored {
        None => Change::New,
        Some(s) if s.hash == current_hash => Change::Unchanged,
        Some(_) => Change::Modified,
    }
}

/// Reconciles one full scan against a snapshot of the store.
///
/// Every scanned path is classified as it arrives; once the scan is done,
/// [`ChangeDetector::deleted`] reports stored paths that were never seen and
/// no longer exist on disk.
#[derive(Debug)]
pub struct ChangeDetector {
    root: PathBuf,
    stored: HashMap<String, StoredFingerprint>,
    seen: HashSet<String>,
}

impl ChangeDetector {
    /// Create a detector from a snapshot of stored fingerprints.
    pub fn new(root: impl AsRef<Path>, stored: Vec<StoredFingerprint>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            stored: stored.into_iter().map(|s| (s.path.clone(), s)).collect(),
            seen: HashSet::new(),
        }
    }

    /// Snapshot `store` for reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn from_store(root: impl AsRef<Path>, store: &RecordStore) -> Result<Self> {
        Ok(Self::new(root, store.get_all()?))
    }

    /// Classify a scanned path by its relative key and current hash.
    pub fn observe(&mut self, key: &str, current_hash: &str) -> Change {
        self.seen.insert(key.to_string());
        classify(current_hash, self.stored.get(key))
    }

    /// Mark a key as present without classifying it, e.g. when it could not
    /// be read this pass.
    pub fn mark_seen(&mut self, key: &str) {
        self.seen.insert(key.to_string());
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn stored_count(&self) -> usize {
        self.stored.len()
    }

    /// Stored keys not seen by the scan whose files no longer exist.
    ///
    /// Unseen records whose files still exist (now filtered out, or skipped
    /// by a racing walk) are left alone.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        let mut deleted: Vec<String> = self
            .stored
            .keys()
            .filter(|key| !self.seen.contains(*key))
            .filter(|key| !self.root.join(key.as_str()).exists())
            .cloned()
            .collect();
        deleted.sort();
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn stored(path: &str, hash: &str) -> StoredFingerprint {
        StoredFingerprint {
            path: path.to_string(),
            hash: hash.to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("h1", None), Change::New);
        assert_eq!(classify("h1", Some(&stored("a", "h1"))), Change::Unchanged);
        assert_eq!(classify("h2", Some(&stored("a", "h1"))), Change::Modified);
    }

    #[test]
    fn test_timestamp_is_ignored() {
        let mut s = stored("a", "h1");
        s.timestamp = 999;
        assert_eq!(classify("h1", Some(&s)), Change::Unchanged);
        s.timestamp = 0;
        assert_eq!(classify("h2", Some(&s)), Change::Modified);
    }

    #[test]
    fn test_needs_summary() {
        assert!(Change::New.needs_summary());
        assert!(Change::Modified.needs_summary());
        assert!(!Change::Unchanged.needs_summary());
        assert!(!Change::Deleted.needs_summary());
    }

    #[test]
    fn test_deleted_requires_absence_on_disk() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("still_here.js"), "x").unwrap();

        let mut detector = ChangeDetector::new(
            tmp.path(),
            vec![
                stored("seen.js", "h"),
                stored("gone.js", "h"),
                stored("still_here.js", "h"),
                stored("sub/gone_too.js", "h"),
            ],
        );
        assert_eq!(detector.stored_count(), 4);

        assert_eq!(detector.observe("seen.js", "h"), Change::Unchanged);
        assert_eq!(detector.observe("fresh.js", "h"), Change::New);

        assert_eq!(
            detector.deleted(),
            vec!["gone.js".to_string(), "sub/gone_too.js".to_string()]
        );
    }

    #[test]
    fn test_mark_seen_protects_from_deletion() {
        let tmp = TempDir::new().unwrap();
        let mut detector = ChangeDetector::new(tmp.path(), vec![stored("a.js", "h")]);
        detector.mark_seen("a.js");
        assert!(detector.deleted().is_empty());
    }

    #[test]
    fn test_from_store() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::in_memory().unwrap();
        store
            .put(&crate::storage::FileRecord::new("a.js", "h", 1, 1, "s", 1))
            .unwrap();

        let mut detector = ChangeDetector::from_store(tmp.path(), &store).unwrap();
        assert_eq!(detector.observe("a.js", "other"), Change::Modified);
    }
}
