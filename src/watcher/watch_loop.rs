//! Long-running watch loop feeding changed files to the pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::events::EventBatch;
use super::filter::FileFilter;
use super::pipeline::{PipelineOutcome, SummaryPipeline};
use super::watcher::EventSource;

/// Lifecycle of a [`WatchLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Created, not yet listening.
    Idle,
    /// Waiting for the next event batch.
    Armed,
    /// Processing a batch.
    HandlingEvent,
    /// Shut down; the event source has been released.
    Stopped,
}

/// Counters for the watch loop.
#[derive(Debug, Default)]
pub struct WatchStats {
    pub events_received: AtomicU64,
    pub events_filtered: AtomicU64,
    pub files_summarized: AtomicU64,
    pub files_unchanged: AtomicU64,
    pub files_skipped: AtomicU64,
    pub files_removed: AtomicU64,
    pub errors: AtomicU64,
    pub store_failures: AtomicU64,
}

impl WatchStats {
    /// Snapshot of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> WatchStatsSnapshot {
        WatchStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            files_summarized: self.files_summarized.load(Ordering::Relaxed),
            files_unchanged: self.files_unchanged.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`WatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStatsSnapshot {
    pub events_received: u64,
    pub events_filtered: u64,
    pub files_summarized: u64,
    pub files_unchanged: u64,
    pub files_skipped: u64,
    pub files_removed: u64,
    pub errors: u64,
    pub store_failures: u64,
}

impl WatchStatsSnapshot {
    /// Whether any record-store read or write failed while watching.
    #[must_use]
    pub const fn has_store_failures(&self) -> bool {
        self.store_failures > 0
    }
}

/// Reacts to file events by re-summarizing only the changed files.
///
/// Events are handled one at a time, in arrival order. A file's own event
/// never touches any other file's record.
pub struct WatchLoop {
    pipeline: Arc<SummaryPipeline>,
    filter: FileFilter,
    state: Mutex<WatchState>,
    stats: Arc<WatchStats>,
}

impl WatchLoop {
    /// Create an idle loop.
    #[must_use]
    pub fn new(pipeline: Arc<SummaryPipeline>, filter: FileFilter) -> Self {
        Self {
            pipeline,
            filter,
            state: Mutex::new(WatchState::Idle),
            stats: Arc::new(WatchStats::default()),
        }
    }

    #[must_use]
    pub fn state(&self) -> WatchState {
        *self.state.lock()
    }

    #[must_use]
    pub fn stats(&self) -> Arc<WatchStats> {
        Arc::clone(&self.stats)
    }

    fn set_state(&self, state: WatchState) {
        *self.state.lock() = state;
    }

    /// Consume `source` until it ends or `shutdown` fires.
    ///
    /// The source is dropped before returning, which releases any OS watch it
    /// holds. Cancellation is observed between files; a summary in flight
    /// completes first.
    pub async fn run<S: EventSource>(&self, mut source: S, shutdown: CancellationToken) {
        self.set_state(WatchState::Armed);
        tracing::info!("Watching for changes");

        loop {
            let batch = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                batch = source.next_batch() => batch,
            };
            let Some(batch) = batch else {
                tracing::info!("Event source closed");
                break;
            };

            self.set_state(WatchState::HandlingEvent);
            self.handle_batch(batch, &shutdown).await;
            if shutdown.is_cancelled() {
                break;
            }
            self.set_state(WatchState::Armed);
        }

        drop(source);
        self.set_state(WatchState::Stopped);

        let snapshot = self.stats.snapshot();
        tracing::info!(
            received = snapshot.events_received,
            summarized = snapshot.files_summarized,
            errors = snapshot.errors,
            store_failures = snapshot.store_failures,
            "Watch loop stopped"
        );
    }

    /// Process one batch of events.
    pub async fn handle_batch(&self, batch: EventBatch, shutdown: &CancellationToken) {
        self.stats
            .events_received
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        for path in &batch.changed {
            if shutdown.is_cancelled() {
                return;
            }
            self.handle_changed(path).await;
        }

        for path in &batch.removed {
            if !self.filter.is_candidate(path) {
                self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            // Records of removed files are dropped by the next full pass.
            tracing::info!(path = %path.display(), "File removed");
            self.stats.files_removed.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn handle_changed(&self, path: &Path) {
        if !self.filter.should_summarize(path) {
            self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        tracing::debug!(path = %path.display(), "File changed");
        match self.pipeline.process_file(path).await {
            Ok(PipelineOutcome::Summarized { .. }) => {
                self.stats.files_summarized.fetch_add(1, Ordering::Relaxed);
            }
            Ok(PipelineOutcome::Unchanged | PipelineOutcome::Missing) => {
                self.stats.files_unchanged.fetch_add(1, Ordering::Relaxed);
            }
            Ok(PipelineOutcome::SkippedOversized { .. }) => {
                self.stats.files_skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_storage() => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Record store write failed; summary was not saved"
                );
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                self.stats.store_failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to process changed file");
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
