//! Change detection, scanning, and watching.
//!
//! This module provides:
//! - Content fingerprinting and the token estimate
//! - Candidate filtering and the lazy tree scan
//! - The summary pipeline and full-pass reconciliation
//! - Debounced watching via notify-rs

mod detector;
mod events;
mod filter;
mod fingerprint;
mod pipeline;
mod scanner;
mod watch_loop;
#[allow(clippy::module_inception)]
mod watcher;

pub use detector::{classify, Change, ChangeDetector};
pub use events::{EventBatch, FileEvent};
pub use filter::FileFilter;
pub use fingerprint::{
    compute_hash, count_words, estimate_tokens, exceeds_ceiling, fingerprint, fingerprint_file,
    FileFingerprint, Fingerprint, TokenEstimate, TOKENS_PER_WORD,
};
pub use pipeline::{PassReport, PipelineConfig, PipelineOutcome, SummaryPipeline};
pub use scanner::{relative_key, ProjectEstimate, TreeScanner};
pub use watch_loop::{WatchLoop, WatchState, WatchStats, WatchStatsSnapshot};
pub use watcher::{EventSource, FileWatcher, WatcherConfig, DEBOUNCE_DURATION};
