//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;

/// Name of the metadata directory created inside the scanned root.
pub const METADATA_DIR_NAME: &str = ".codebrief";

/// File name of the record store inside the metadata directory.
pub const DATABASE_FILE_NAME: &str = "codebrief.db";

/// Default estimated-token ceiling above which files are not summarized.
pub const DEFAULT_TOKEN_CEILING: f64 = 3500.0;

/// Main configuration for a summarization run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory to scan and watch.
    pub root_dir: PathBuf,

    /// Directory names pruned from every walk (e.g. `node_modules`).
    pub ignore_dirs: Vec<String>,

    /// File extensions to summarize, with or without the leading dot.
    pub extensions: Vec<String>,

    /// Also skip paths matched by the root's `.gitignore`.
    pub respect_gitignore: bool,

    /// Substrings that exclude a path from watch events.
    pub watch_exclude: Vec<String>,

    /// Model identifier passed to the summarization service.
    pub model: String,

    /// Estimated-token ceiling; files strictly above it are skipped.
    pub token_ceiling: f64,

    /// Maximum summarization requests in flight at once.
    pub max_concurrent_requests: usize,

    /// Retries after a failed summarization request.
    pub max_retries: u32,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            ignore_dirs: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "target".to_string(),
            ],
            extensions: vec![".js".to_string()],
            respect_gitignore: false,
            watch_exclude: vec!["node_modules".to_string(), "helpers".to_string()],
            model: "gpt-3.5-turbo".to_string(),
            token_ceiling: DEFAULT_TOKEN_CEILING,
            max_concurrent_requests: 1,
            max_retries: 0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "root directory '{}' does not exist or is not a directory",
                self.root_dir.display()
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.extensions.iter().all(|e| e.trim_matches('.').is_empty()) {
            return Err(Error::config("at least one file extension is required"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model cannot be empty"));
        }

        if !self.token_ceiling.is_finite() || self.token_ceiling <= 0.0 {
            return Err(Error::config("token ceiling must be a positive number"));
        }

        if self.max_concurrent_requests == 0 {
            return Err(Error::config("max_concurrent_requests cannot be 0"));
        }

        if self.max_concurrent_requests > 16 {
            return Err(Error::config(
                "max_concurrent_requests cannot exceed 16 (shared rate-limited service)",
            ));
        }

        Ok(())
    }

    /// Directory holding the record store.
    #[must_use]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root_dir.join(METADATA_DIR_NAME)
    }

    /// Path to the `SQLite` record store.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.metadata_dir().join(DATABASE_FILE_NAME)
    }

    /// Directory names dropped from watch events when they appear as a whole
    /// path component: the ignore list plus the metadata directory.
    #[must_use]
    pub fn watch_ignored_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .ignore_dirs
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        dirs.push(METADATA_DIR_NAME.to_string());
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Substrings of the relative path dropped from watch events.
    #[must_use]
    pub fn watch_exclusions(&self) -> Vec<String> {
        self.watch_exclude
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            root_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.token_ceiling - 3500.0).abs() < f64::EPSILON);
        assert_eq!(config.max_concurrent_requests, 1);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_config_new_validates_in_existing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(config_in(&tmp).validate().is_ok());
    }

    #[test]
    fn test_validate_missing_root() {
        let config = Config {
            root_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root directory"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            log_level: "loud".to_string(),
            ..config_in(&tmp)
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_no_extensions() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            extensions: vec![".".to_string(), String::new()],
            ..config_in(&tmp)
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("extension"));
    }

    #[test]
    fn test_validate_empty_model() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            model: "  ".to_string(),
            ..config_in(&tmp)
        };
        assert!(config.validate().unwrap_err().to_string().contains("model"));
    }

    #[test]
    fn test_validate_bad_ceiling() {
        let tmp = TempDir::new().unwrap();
        for ceiling in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = Config {
                token_ceiling: ceiling,
                ..config_in(&tmp)
            };
            assert!(config.validate().is_err(), "ceiling {ceiling} accepted");
        }
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let tmp = TempDir::new().unwrap();
        let zero = Config {
            max_concurrent_requests: 0,
            ..config_in(&tmp)
        };
        assert!(zero.validate().is_err());

        let too_many = Config {
            max_concurrent_requests: 64,
            ..config_in(&tmp)
        };
        assert!(too_many.validate().unwrap_err().to_string().contains("16"));
    }

    #[test]
    fn test_database_path() {
        let config = Config {
            root_dir: PathBuf::from("/work/project"),
            ..Default::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/work/project/.codebrief/codebrief.db")
        );
    }

    #[test]
    fn test_watch_ignored_dirs_include_metadata_dir() {
        let config = Config {
            ignore_dirs: vec!["node_modules".to_string(), "dist".to_string(), "dist".to_string()],
            watch_exclude: vec!["helpers".to_string(), String::new()],
            ..Default::default()
        };
        let dirs = config.watch_ignored_dirs();
        assert!(dirs.contains(&".codebrief".to_string()));
        assert!(dirs.contains(&"node_modules".to_string()));
        assert_eq!(dirs.iter().filter(|s| *s == "dist").count(), 1);
        assert!(!dirs.contains(&"helpers".to_string()));

        assert_eq!(config.watch_exclusions(), vec!["helpers".to_string()]);
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let tmp = TempDir::new().unwrap();
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..config_in(&tmp)
            };
            assert!(config.validate().is_ok(), "Level '{level}' should be valid");
        }
    }
}
