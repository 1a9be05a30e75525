//! Directory scanner for full passes and the pre-flight estimate.
//!
//! Walks the root depth-first, pruning ignored directories before descending,
//! and lazily yields candidate files.

use std::path::{Component, Path, PathBuf};

use tokio::sync::mpsc;
use walkdir::{DirEntry, WalkDir};

use super::filter::FileFilter;
use crate::error::WatcherError;
use crate::Result;

/// Characters per token assumed by the pre-flight estimate.
const CHARS_PER_TOKEN: f64 = 4.0;

/// One-shot walker over a root directory.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    filter: FileFilter,
}

/// Result of the pre-flight size estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectEstimate {
    pub files: usize,
    pub chars: usize,
    pub tokens: f64,
}

impl TreeScanner {
    /// Create a scanner over `filter.root()`.
    #[must_use]
    pub const fn new(filter: FileFilter) -> Self {
        Self { filter }
    }

    /// Root being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.filter.root()
    }

    /// Lazily yield every candidate file under the root.
    ///
    /// Order is unspecified. Entries that vanish or cannot be read mid-walk
    /// are logged and skipped. Symlinks to files are yielded under the link's
    /// own path; symlinked directories are not descended into.
    pub fn scan(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(self.filter.root())
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_pruned(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "Error walking directory");
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
            })
            .map(DirEntry::into_path)
            .filter(|path| self.filter.is_candidate(path))
    }

    /// Scan on the current thread, sending each candidate to `tx`.
    ///
    /// Stops early if the receiver is dropped. Returns the number sent.
    pub fn scan_into(&self, tx: &mpsc::Sender<PathBuf>) -> usize {
        tracing::info!(path = %self.root().display(), "Starting directory scan");

        let mut sent = 0;
        for path in self.scan() {
            if tx.blocking_send(path).is_err() {
                tracing::debug!("Scan receiver closed, stopping");
                break;
            }
            sent += 1;
        }

        tracing::info!(path = %self.root().display(), files = sent, "Directory scan complete");
        sent
    }

    /// Sum the size of every candidate file without touching the record store.
    ///
    /// Unreadable files are skipped with a warning.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_project_tokens(&self) -> ProjectEstimate {
        let mut estimate = ProjectEstimate::default();
        for path in self.scan() {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    estimate.files += 1;
                    estimate.chars += content.chars().count();
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                }
            }
        }
        estimate.tokens = estimate.chars as f64 / CHARS_PER_TOKEN;
        estimate
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.filter.is_ignored_dir_name(name))
    }
}

/// Store key for `path`: relative to `root`, `/`-separated.
///
/// # Errors
///
/// Returns an error if `path` is not under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| WatcherError::OutsideRoot {
            path: path.display().to_string(),
            root: root.display().to_string(),
        })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Err(WatcherError::ProcessFailed {
            path: path.display().to_string(),
            reason: "path is the root itself".to_string(),
        }
        .into());
    }

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn scanner(root: &Path) -> TreeScanner {
        TreeScanner::new(FileFilter::new(
            root,
            &["node_modules".to_string()],
            &[".txt".to_string()],
        ))
    }

    #[test]
    fn test_scan_filters_and_prunes() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();
        fs::write(src.join("c.rs"), "c").unwrap();
        fs::write(src.join("b.txt.ai.txt"), "summary").unwrap();
        let nm = tmp.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("d.txt"), "d").unwrap();
        let meta = tmp.path().join(".codebrief");
        fs::create_dir(&meta).unwrap();
        fs::write(meta.join("e.txt"), "e").unwrap();

        let s = scanner(tmp.path());
        let found: HashSet<PathBuf> = s.scan().collect();

        let expected: HashSet<PathBuf> =
            [tmp.path().join("a.txt"), src.join("b.txt")].into_iter().collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_scan_visits_each_file_once() {
        let tmp = TempDir::new().unwrap();
        for i in 0..20 {
            let dir = tmp.path().join(format!("d{}", i % 4));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("f{i}.txt")), "x").unwrap();
        }

        let paths: Vec<PathBuf> = scanner(tmp.path()).scan().collect();
        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(paths.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_file_symlinks_only() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("shared.txt"), "shared").unwrap();
        fs::create_dir(outside.path().join("lib")).unwrap();
        fs::write(outside.path().join("lib/inner.txt"), "inner").unwrap();

        std::os::unix::fs::symlink(outside.path().join("shared.txt"), tmp.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("lib"), tmp.path().join("lib")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("missing.txt"), tmp.path().join("dangling.txt"))
            .unwrap();

        let found: Vec<PathBuf> = scanner(tmp.path()).scan().collect();
        assert_eq!(found, vec![tmp.path().join("link.txt")]);
    }

    #[test]
    fn test_scan_missing_root_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        let s = scanner(&tmp.path().join("gone"));
        assert_eq!(s.scan().count(), 0);
    }

    #[tokio::test]
    async fn test_scan_into_channel() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let s = scanner(tmp.path());
        let sent = tokio::task::spawn_blocking(move || s.scan_into(&tx))
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let mut received = vec![];
        while let Some(p) = rx.recv().await {
            received.push(p);
        }
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_estimate_project_tokens() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "x".repeat(400)).unwrap();
        fs::write(tmp.path().join("b.txt"), "y".repeat(400)).unwrap();
        fs::write(tmp.path().join("c.rs"), "z".repeat(4000)).unwrap();

        let est = scanner(tmp.path()).estimate_project_tokens();
        assert_eq!(est.files, 2);
        assert_eq!(est.chars, 800);
        assert!((est.tokens - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_relative_key() {
        let root = Path::new("/p");
        assert_eq!(
            relative_key(root, Path::new("/p/src/a.js")).unwrap(),
            "src/a.js"
        );
        assert!(relative_key(root, Path::new("/q/a.js")).is_err());
        assert!(relative_key(root, Path::new("/p")).is_err());
    }
}
