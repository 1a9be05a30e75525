//! Which paths are summarization candidates.

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::config::{Config, METADATA_DIR_NAME};
use crate::summary::is_artifact;

/// Path filter built from the ignore list and the extension allow-list.
#[derive(Debug, Clone)]
pub struct FileFilter {
    root: PathBuf,
    ignore_dirs: Vec<String>,
    extensions: Vec<String>,
    gitignore: Option<Gitignore>,
}

impl FileFilter {
    /// Create a filter rooted at `root`.
    ///
    /// Extensions may be given with or without a leading dot and match
    /// case-insensitively.
    pub fn new(root: impl AsRef<Path>, ignore_dirs: &[String], extensions: &[String]) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ignore_dirs: ignore_dirs
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            extensions: extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            gitignore: None,
        }
    }

    /// Build the filter described by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let filter = Self::new(&config.root_dir, &config.ignore_dirs, &config.extensions);
        if config.respect_gitignore {
            filter.with_gitignore()
        } else {
            filter
        }
    }

    /// Also exclude paths matched by the root's `.gitignore`, if present.
    #[must_use]
    pub fn with_gitignore(mut self) -> Self {
        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(&self.root);
            match builder.add(&gitignore_path) {
                None => self.gitignore = builder.build().ok(),
                Some(e) => tracing::warn!(error = %e, "Ignoring unreadable .gitignore"),
            }
        }
        self
    }

    /// Root the filter resolves relative paths against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a directory with this name is pruned from walks.
    #[must_use]
    pub fn is_ignored_dir_name(&self, name: &str) -> bool {
        name == METADATA_DIR_NAME || self.ignore_dirs.iter().any(|d| d == name)
    }

    /// Whether the path's extension is in the allow-list.
    #[must_use]
    pub fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }

    /// Whether `path` qualifies by name alone (no filesystem access).
    #[must_use]
    pub fn is_candidate(&self, path: &Path) -> bool {
        if !self.has_allowed_extension(path) || is_artifact(path) {
            return false;
        }

        let stripped = path.strip_prefix(&self.root).ok();
        let relative = stripped.unwrap_or(path);
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            // Only directory components are matched against the ignore list.
            if components.peek().is_none() {
                break;
            }
            if let Component::Normal(name) = component {
                if self.is_ignored_dir_name(&name.to_string_lossy()) {
                    return false;
                }
            }
        }

        if let (Some(gi), Some(relative)) = (&self.gitignore, stripped) {
            if gi.matched_path_or_any_parents(relative, false).is_ignore() {
                return false;
            }
        }

        true
    }

    /// Whether `path` is an existing regular file that should be summarized.
    #[must_use]
    pub fn should_summarize(&self, path: &Path) -> bool {
        path.is_file() && self.is_candidate(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn filter(root: &Path) -> FileFilter {
        FileFilter::new(
            root,
            &strings(&["node_modules", "dist"]),
            &strings(&[".js", "TS"]),
        )
    }

    #[test]
    fn test_extension_allow_list() {
        let f = filter(Path::new("/p"));
        assert!(f.has_allowed_extension(Path::new("/p/a.js")));
        assert!(f.has_allowed_extension(Path::new("/p/a.JS")));
        assert!(f.has_allowed_extension(Path::new("/p/b.ts")));
        assert!(!f.has_allowed_extension(Path::new("/p/c.rs")));
        assert!(!f.has_allowed_extension(Path::new("/p/Makefile")));
    }

    #[test]
    fn test_ignored_directories() {
        let f = filter(Path::new("/p"));
        assert!(f.is_candidate(Path::new("/p/src/a.js")));
        assert!(!f.is_candidate(Path::new("/p/node_modules/pkg/index.js")));
        assert!(!f.is_candidate(Path::new("/p/src/dist/bundle.js")));
        assert!(!f.is_candidate(Path::new("/p/.codebrief/x.js")));
    }

    #[test]
    fn test_ignored_name_only_applies_to_directories() {
        let f = FileFilter::new("/p", &strings(&["dist.js"]), &strings(&["js"]));
        assert!(f.is_candidate(Path::new("/p/dist.js")));
    }

    #[test]
    fn test_root_components_not_matched() {
        // The root itself may live under a directory named like an ignored one.
        let f = filter(Path::new("/home/dist/project"));
        assert!(f.is_candidate(Path::new("/home/dist/project/a.js")));
    }

    #[test]
    fn test_artifacts_never_candidates() {
        let f = FileFilter::new("/p", &[], &strings(&["txt"]));
        assert!(f.is_candidate(Path::new("/p/a.txt")));
        assert!(!f.is_candidate(Path::new("/p/a.txt.ai.txt")));
    }

    #[test]
    fn test_should_summarize_requires_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.js"), "x").unwrap();
        fs::create_dir(tmp.path().join("dir.js")).unwrap();

        let f = filter(tmp.path());
        assert!(f.should_summarize(&tmp.path().join("a.js")));
        assert!(!f.should_summarize(&tmp.path().join("dir.js")));
        assert!(!f.should_summarize(&tmp.path().join("missing.js")));
    }

    #[test]
    fn test_with_gitignore() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "generated/\n*.min.js\n").unwrap();

        let f = filter(tmp.path()).with_gitignore();
        assert!(f.is_candidate(&tmp.path().join("src/a.js")));
        assert!(!f.is_candidate(&tmp.path().join("app.min.js")));
        assert!(!f.is_candidate(&tmp.path().join("generated/b.js")));

        let plain = filter(tmp.path());
        assert!(plain.is_candidate(&tmp.path().join("app.min.js")));
    }
}
