//! Data models for the record store.

use serde::{Deserialize, Serialize};

/// Persisted metadata and the last summary for one source file.
///
/// Always written whole: `content_hash` and `summary` come from the same
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scanned root, `/`-separated.
    pub path: String,

    /// BLAKE3 hex digest of the content that produced `summary`.
    pub content_hash: String,

    /// Modification time observed when summarized (Unix milliseconds).
    pub last_modified: i64,

    /// Estimated tokens in the file content.
    pub content_tokens: i64,

    /// Generated summary text.
    pub summary: String,

    /// Estimated tokens in the summary.
    pub summary_tokens: i64,

    /// External dependencies detected in the file.
    pub dependency_libraries: Vec<String>,
}

impl FileRecord {
    /// Create a record with no detected dependencies.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        content_hash: impl Into<String>,
        last_modified: i64,
        content_tokens: i64,
        summary: impl Into<String>,
        summary_tokens: i64,
    ) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
            last_modified,
            content_tokens,
            summary: summary.into(),
            summary_tokens,
            dependency_libraries: Vec::new(),
        }
    }

    /// Set detected dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, libs: Vec<String>) -> Self {
        self.dependency_libraries = libs;
        self
    }

    /// The fingerprint projection of this record.
    #[must_use]
    pub fn fingerprint(&self) -> StoredFingerprint {
        StoredFingerprint {
            path: self.path.clone(),
            hash: self.content_hash.clone(),
            timestamp: self.last_modified,
        }
    }
}

/// `{path, hash, timestamp}` triple used for reconciliation.
///
/// Deliberately carries no summary text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFingerprint {
    pub path: String,
    pub hash: String,
    pub timestamp: i64,
}
