//! Content fingerprints: a BLAKE3 hash plus an estimated token count.
//!
//! The token estimate is a cheap proxy, not a tokenizer: whitespace-separated
//! words multiplied by [`TOKENS_PER_WORD`], which tracks model token counts
//! closely enough for budgeting and the size ceiling.

use std::path::Path;
use std::time::UNIX_EPOCH;

use blake3::Hasher;

use crate::Result;

/// Approximate model tokens per whitespace-separated word.
pub const TOKENS_PER_WORD: f64 = 1.33;

/// Estimated model-token count.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct TokenEstimate(f64);

impl TokenEstimate {
    /// Wrap a raw estimate.
    #[must_use]
    pub const fn new(tokens: f64) -> Self {
        Self(tokens)
    }

    /// The raw estimate.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Estimate rounded to the nearest whole token, as persisted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rounded(self) -> i64 {
        self.0.round() as i64
    }
}

impl std::fmt::Display for TokenEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Hash and token estimate of one piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    /// BLAKE3 hex digest.
    pub hash: String,
    /// Estimated model tokens.
    pub tokens: TokenEstimate,
}

/// A file's content together with its fingerprint and modification time.
#[derive(Debug, Clone)]
pub struct FileFingerprint {
    pub content: String,
    pub fingerprint: Fingerprint,
    /// Modification time in Unix milliseconds.
    pub modified_ms: i64,
}

/// Count whitespace-separated words.
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimate the model-token size of `text`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_tokens(text: &str) -> TokenEstimate {
    TokenEstimate(count_words(text) as f64 * TOKENS_PER_WORD)
}

/// BLAKE3 hex digest of `content`.
#[must_use]
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Fingerprint in-memory content.
#[must_use]
pub fn fingerprint(content: &str) -> Fingerprint {
    Fingerprint {
        hash: compute_hash(content.as_bytes()),
        tokens: estimate_tokens(content),
    }
}

/// The size gate: a file is excluded only when strictly above the ceiling.
#[must_use]
pub fn exceeds_ceiling(tokens: TokenEstimate, ceiling: f64) -> bool {
    tokens.value() > ceiling
}

/// Read `path` and fingerprint its current content.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or is not valid UTF-8.
pub async fn fingerprint_file(path: &Path) -> Result<FileFingerprint> {
    let content = tokio::fs::read_to_string(path).await?;
    let metadata = tokio::fs::metadata(path).await?;
    let modified_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

    Ok(FileFingerprint {
        fingerprint: fingerprint(&content),
        content,
        modified_ms,
    })
}
