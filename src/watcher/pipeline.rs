//! Summary pipeline: fingerprint, size gate, summarize, persist.
//!
//! A record is only written after the summarizer returns, and it is written
//! whole. Any failure before that point leaves the previous record in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use super::detector::{classify, Change, ChangeDetector};
use super::fingerprint::{estimate_tokens, exceeds_ceiling, fingerprint_file, FileFingerprint};
use super::scanner::{relative_key, TreeScanner};
use crate::config::Config;
use crate::storage::{FileRecord, RecordStore};
use crate::summary::{remove_artifact, write_artifact, Summarizer};
use crate::{Error, Result};

/// Base delay between summarizer retries; doubles per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root that relative keys are computed against.
    pub root: PathBuf,
    /// Model passed to the summarizer.
    pub model: String,
    /// Files with an estimate strictly above this are skipped.
    pub token_ceiling: f64,
    /// Summarizer calls allowed in flight.
    pub max_concurrent_requests: usize,
    /// Retries after a failed summarizer call.
    pub max_retries: u32,
    /// Base retry delay.
    pub retry_backoff: Duration,
    /// Write `<name>.ai.txt` next to each summarized file.
    pub write_artifacts: bool,
}

impl PipelineConfig {
    /// Settings derived from the run configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.root_dir.clone(),
            model: config.model.clone(),
            token_ceiling: config.token_ceiling,
            max_concurrent_requests: config.max_concurrent_requests,
            max_retries: config.max_retries,
            retry_backoff: RETRY_BACKOFF,
            write_artifacts: true,
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Stored hash already matches; nothing was called or written.
    Unchanged,
    /// A new record was written.
    Summarized { change: Change, record: FileRecord },
    /// Estimate above the ceiling; nothing was called or written.
    SkippedOversized { tokens: f64 },
    /// The file disappeared before it could be read.
    Missing,
}

/// Counters for one full pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub scanned: u64,
    pub new: u64,
    pub modified: u64,
    pub unchanged: u64,
    pub summarized: u64,
    pub skipped_oversized: u64,
    pub missing: u64,
    pub deleted: u64,
    pub failed: u64,
    pub store_failures: u64,
    pub cancelled: bool,
}

impl PassReport {
    /// Whether any record-store write failed during the pass.
    #[must_use]
    pub const fn has_store_failures(&self) -> bool {
        self.store_failures > 0
    }
}

/// Orchestrates summarization for changed files.
pub struct SummaryPipeline {
    store: RecordStore,
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
    permits: Semaphore,
}

impl SummaryPipeline {
    /// Create a pipeline writing to `store`.
    pub fn new(store: RecordStore, summarizer: Arc<dyn Summarizer>, config: PipelineConfig) -> Self {
        let permits = Semaphore::new(config.max_concurrent_requests.max(1));
        Self {
            store,
            summarizer,
            config,
            permits,
        }
    }

    /// The record store this pipeline writes to.
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Pipeline settings.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Store key for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is outside the root.
    pub fn key_for(&self, path: &Path) -> Result<String> {
        relative_key(&self.config.root, path)
    }

    /// Classify a single file against its record and summarize it if needed.
    ///
    /// Used for watch events: no other file is read or touched.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable input, summarizer failure, or a failed
    /// store read or write.
    pub async fn process_file(&self, path: &Path) -> Result<PipelineOutcome> {
        let key = self.key_for(path)?;
        let Some(file) = read_if_present(path).await? else {
            tracing::debug!(path = %key, "File no longer exists");
            return Ok(PipelineOutcome::Missing);
        };

        let stored = self.store.fingerprint(&key)?;
        let change = classify(&file.fingerprint.hash, stored.as_ref());
        if !change.needs_summary() {
            tracing::debug!(path = %key, "File unchanged, skipping");
            return Ok(PipelineOutcome::Unchanged);
        }

        self.summarize(path, change).await
    }

    /// Summarize a file already classified as new or modified.
    ///
    /// Re-reads the file, so the summary always matches the latest content.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable input, summarizer failure, or a failed
    /// store write.
    pub async fn summarize(&self, path: &Path, change: Change) -> Result<PipelineOutcome> {
        let key = self.key_for(path)?;
        let Some(file) = read_if_present(path).await? else {
            tracing::debug!(path = %key, "File vanished before summarizing");
            return Ok(PipelineOutcome::Missing);
        };

        let tokens = file.fingerprint.tokens;
        if exceeds_ceiling(tokens, self.config.token_ceiling) {
            tracing::warn!(
                path = %key,
                tokens = %tokens,
                ceiling = self.config.token_ceiling,
                "File exceeds token ceiling, not summarizing"
            );
            if change == Change::Modified && self.invalidate(&key).await? {
                tracing::warn!(path = %key, "Dropped stale summary of oversized file");
            }
            return Ok(PipelineOutcome::SkippedOversized {
                tokens: tokens.value(),
            });
        }

        tracing::info!(path = %key, %change, tokens = %tokens, "Summarizing file");
        let summary = self.call_summarizer(&key, &file.content).await?;

        let summary_tokens = estimate_tokens(&summary).rounded();
        let record = FileRecord::new(
            key.clone(),
            file.fingerprint.hash,
            file.modified_ms,
            tokens.rounded(),
            summary,
            summary_tokens,
        );

        self.store.put(&record)?;

        if self.config.write_artifacts {
            match write_artifact(path, &key, &record.summary).await {
                Ok(artifact) => {
                    tracing::info!(path = %key, artifact = %artifact.display(), "Updated summary");
                }
                Err(e) => {
                    tracing::warn!(path = %key, error = %e, "Summary stored but artifact not written");
                }
            }
        } else {
            tracing::info!(path = %key, "Updated summary");
        }

        Ok(PipelineOutcome::Summarized { change, record })
    }

    /// Drop the record and artifact of a file removed from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    pub async fn remove_deleted(&self, key: &str) -> Result<bool> {
        let removed = self.invalidate(key).await?;
        if removed {
            tracing::info!(path = key, "Removed record for deleted file");
        }
        Ok(removed)
    }

    /// Drop the record and artifact for `key`; returns whether a record existed.
    async fn invalidate(&self, key: &str) -> Result<bool> {
        let removed = self.store.remove(key)?;
        if let Err(e) = remove_artifact(&self.config.root.join(key)).await {
            tracing::warn!(path = key, error = %e, "Failed to remove stale summary artifact");
        }
        Ok(removed)
    }

    /// Reconcile the whole tree: summarize new and modified files, then drop
    /// records of deleted files.
    ///
    /// Files are classified in scan order; up to `max_concurrent_requests`
    /// summaries run at once. Per-file failures are logged and counted; they
    /// never stop the pass. Cancellation is observed between files, summaries
    /// already started complete, and a cancelled pass skips deletion.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stored snapshot cannot be read or the
    /// scan task dies.
    pub async fn run_full_pass(
        &self,
        scanner: &TreeScanner,
        shutdown: &CancellationToken,
    ) -> Result<PassReport> {
        let mut report = PassReport::default();
        let mut detector = ChangeDetector::from_store(&self.config.root, &self.store)?;
        let cap = self.config.max_concurrent_requests.max(1);
        tracing::info!(tracked = detector.stored_count(), cap, "Starting full pass");

        let (tx, mut rx) = mpsc::channel(256);
        let walker = scanner.clone();
        let scan = tokio::task::spawn_blocking(move || walker.scan_into(&tx));

        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                Some((path, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    let path: PathBuf = path;
                    record_outcome(&mut report, &path, result);
                }
                next = rx.recv(), if in_flight.len() < cap => {
                    let Some(path) = next else { break };
                    if shutdown.is_cancelled() {
                        report.cancelled = true;
                        break;
                    }
                    report.scanned += 1;

                    let change = match self.observe(&mut detector, &path).await {
                        Ok(change) => change,
                        Err(e) => {
                            tracing::error!(path = %path.display(), error = %e, "Failed to read file");
                            report.failed += 1;
                            continue;
                        }
                    };

                    match change {
                        Change::Unchanged => report.unchanged += 1,
                        Change::New | Change::Modified => {
                            if change == Change::New {
                                report.new += 1;
                            } else {
                                report.modified += 1;
                            }
                            in_flight.push(async move {
                                let result = self.summarize(&path, change).await;
                                (path, result)
                            });
                        }
                        Change::Deleted => {}
                    }
                }
            }
        }
        drop(rx);
        while let Some((path, result)) = in_flight.next().await {
            record_outcome(&mut report, &path, result);
        }

        scan.await
            .map_err(|e| Error::internal(format!("scan task failed: {e}")))?;

        if report.cancelled {
            tracing::info!("Full pass cancelled, skipping deletion check");
            return Ok(report);
        }

        for key in detector.deleted() {
            match self.remove_deleted(&key).await {
                Ok(_) => report.deleted += 1,
                Err(e) => {
                    tracing::error!(path = %key, error = %e, "Failed to remove record of deleted file");
                    report.failed += 1;
                    if e.is_storage() {
                        report.store_failures += 1;
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            summarized = report.summarized,
            unchanged = report.unchanged,
            skipped = report.skipped_oversized,
            deleted = report.deleted,
            failed = report.failed,
            "Full pass complete"
        );
        Ok(report)
    }

    async fn observe(&self, detector: &mut ChangeDetector, path: &Path) -> Result<Change> {
        let key = self.key_for(path)?;
        match fingerprint_file(path).await {
            Ok(file) => Ok(detector.observe(&key, &file.fingerprint.hash)),
            Err(e) => {
                // Present but unreadable: never treat it as deleted.
                detector.mark_seen(&key);
                Err(e)
            }
        }
    }

    async fn call_summarizer(&self, key: &str, content: &str) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::internal("summarizer permits closed"))?;

        let mut attempt: u32 = 0;
        loop {
            match self.summarizer.summarize(content, &self.config.model).await {
                Ok(summary) => return Ok(summary),
                Err(e) if attempt < self.config.max_retries => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        path = key,
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Summarizer call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_if_present(path: &Path) -> Result<Option<FileFingerprint>> {
    match fingerprint_file(path).await {
        Ok(file) => Ok(Some(file)),
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn record_outcome(report: &mut PassReport, path: &Path, result: Result<PipelineOutcome>) {
    match result {
        Ok(PipelineOutcome::Summarized { .. }) => report.summarized += 1,
        Ok(PipelineOutcome::SkippedOversized { .. }) => report.skipped_oversized += 1,
        Ok(PipelineOutcome::Missing) => report.missing += 1,
        Ok(PipelineOutcome::Unchanged) => report.unchanged += 1,
        Err(e) if e.is_storage() => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Record store write failed; summary was not saved"
            );
            report.failed += 1;
            report.store_failures += 1;
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to summarize file");
            report.failed += 1;
        }
    }
}
