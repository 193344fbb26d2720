//! Worker: processes one tag at a time from the shared queue
//!
//! For every tag the worker fetches the clan's war log, archives each finished
//! war not yet in the store, and writes the tags those wars reference back
//! into the ledger.

use crate::api::{ApiClient, ApiError};
use crate::crawler::frontier::WorkItem;
use crate::crawler::limiter::RequestLimiter;
use crate::state::CandidateStatus;
use crate::storage::{RetryPolicy, Storage};
use crate::tag::{normalize_tag, ClanTag};
use crate::war::{archive_entry, ArchiveOutcome};
use crate::ArchiverError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};

/// Outcome of processing a single tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// War log processed
    Done {
        archived: usize,
        terminal: usize,
        discovered: usize,
    },
    /// No public war data; the reason is stored as the ledger note
    Skipped(String),
    /// Transient failure; the tag is back in `pending` or has given up
    Retried(CandidateStatus),
    /// Shutdown arrived before processing started; the tag is `pending` again
    Released,
}

/// Counters accumulated by workers and merged by the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub processed: u64,
    pub done: u64,
    pub skipped: u64,
    pub failed: u64,
    pub retried: u64,
    pub released: u64,
    pub wars_archived: u64,
    pub tags_discovered: u64,
}

impl CrawlReport {
    pub fn record(&mut self, outcome: &TagOutcome) {
        match outcome {
            TagOutcome::Done {
                archived,
                discovered,
                ..
            } => {
                self.processed += 1;
                self.done += 1;
                self.wars_archived += *archived as u64;
                self.tags_discovered += *discovered as u64;
            }
            TagOutcome::Skipped(_) => {
                self.processed += 1;
                self.skipped += 1;
            }
            TagOutcome::Retried(status) => {
                self.processed += 1;
                self.retried += 1;
                if *status == CandidateStatus::Failed {
                    self.failed += 1;
                }
            }
            TagOutcome::Released => self.released += 1,
        }
    }

    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    pub fn merge(&mut self, other: &CrawlReport) {
        self.processed += other.processed;
        self.done += other.done;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.retried += other.retried;
        self.released += other.released;
        self.wars_archived += other.wars_archived;
        self.tags_discovered += other.tags_discovered;
    }
}

/// Logs crawl throughput every `every` finished tags
#[derive(Debug)]
pub struct CrawlProgress {
    finished: AtomicUsize,
    every: usize,
    started: Instant,
}

impl CrawlProgress {
    pub fn new(every: usize) -> Self {
        Self {
            finished: AtomicUsize::new(0),
            every: every.max(1),
            started: Instant::now(),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Counts one finished tag and logs when a reporting boundary is crossed
    pub fn tick(&self, in_flight: usize) {
        let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        if finished % self.every == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                finished as f64 / elapsed
            } else {
                0.0
            };
            tracing::info!(
                "Progress: {} tags processed, {} in flight, {:.2} tags/sec",
                finished,
                in_flight,
                rate
            );
        }
    }
}

/// State shared by every worker of one crawl
pub struct WorkerShared {
    pub api: Arc<dyn ApiClient>,
    pub storage: Arc<dyn Storage>,
    pub limiter: Arc<RequestLimiter>,
    pub queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    pub in_flight: Arc<AtomicUsize>,
    pub progress: CrawlProgress,
    pub shutdown_tx: Arc<watch::Sender<bool>>,
    pub retry: RetryPolicy,
}

/// A single queue consumer
pub struct Worker {
    id: usize,
    shared: Arc<WorkerShared>,
}

impl Worker {
    pub fn new(id: usize, shared: Arc<WorkerShared>) -> Self {
        Self { id, shared }
    }

    /// Consumes the queue until a shutdown sentinel arrives
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Counters for the tags this worker handled
    /// * `Err(ArchiverError)` - A fatal API error; the crawl-wide shutdown
    ///   signal has already been sent
    pub async fn run(self) -> Result<CrawlReport, ArchiverError> {
        let mut report = CrawlReport::default();
        tracing::debug!("Worker {} started", self.id);

        loop {
            let item = {
                let mut queue = self.shared.queue.lock().await;
                queue.recv().await
            };

            let tag = match item {
                Some(WorkItem::Tag(tag)) => tag,
                Some(WorkItem::Shutdown) | None => break,
            };

            let result = if *self.shared.shutdown_tx.borrow() {
                self.release(&tag)
            } else {
                self.process(&tag).await
            };
            let in_flight = self
                .shared
                .in_flight
                .fetch_sub(1, Ordering::SeqCst)
                .saturating_sub(1);

            match result {
                Ok(outcome) => {
                    tracing::debug!("Worker {} finished {}: {:?}", self.id, tag, outcome);
                    if outcome != TagOutcome::Released {
                        self.shared.progress.tick(in_flight);
                    }
                    report.record(&outcome);
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Halting crawl on {}: {}", tag, e);
                    self.shared.shutdown_tx.send_replace(true);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Worker {} failed on {}: {}", self.id, tag, e);
                    if let Err(mark_err) =
                        self.shared
                            .storage
                            .mark_result(tag.as_str(), CandidateStatus::Failed, &e.to_string())
                    {
                        tracing::error!("Could not mark {} as failed: {}", tag, mark_err);
                    }
                    self.shared.progress.tick(in_flight);
                    report.record_failure();
                }
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
        Ok(report)
    }

    fn release(&self, tag: &ClanTag) -> Result<TagOutcome, ArchiverError> {
        self.shared.storage.mark_result(
            tag.as_str(),
            CandidateStatus::Pending,
            "released on shutdown",
        )?;
        Ok(TagOutcome::Released)
    }

    /// Fetches and archives one clan's war log
    pub async fn process(&self, tag: &ClanTag) -> Result<TagOutcome, ArchiverError> {
        let storage = &self.shared.storage;

        self.shared.limiter.acquire().await;
        let entries = match self.shared.api.fetch_war_log(tag).await {
            Ok(entries) => entries,
            Err(ApiError::Transient(reason)) => {
                let note = format!("transient: {}", reason);
                let status = storage.record_transient(
                    tag.as_str(),
                    &note,
                    &self.shared.retry,
                )?;
                tracing::debug!("Transient failure on {} ({}), now {}", tag, reason, status);
                return Ok(TagOutcome::Retried(status));
            }
            Err(e @ ApiError::Forbidden(_)) => {
                storage.mark_result(tag.as_str(), CandidateStatus::Skipped, &e.to_string())?;
                return Err(e.into());
            }
            Err(e) => {
                let reason = e.to_string();
                storage.mark_result(tag.as_str(), CandidateStatus::Skipped, &reason)?;
                return Ok(TagOutcome::Skipped(reason));
            }
        };

        let mut archived = 0;
        let mut terminal = 0;
        let mut discovered = 0;

        for entry in entries.iter().filter(|e| e.is_terminal()) {
            terminal += 1;

            match archive_entry(storage.as_ref(), entry, tag)? {
                ArchiveOutcome::Archived { .. } => archived += 1,
                ArchiveOutcome::AlreadyArchived { .. } => continue,
                ArchiveOutcome::Unreadable(e) => {
                    tracing::warn!("Unreadable war in log of {}: {}", tag, e);
                    continue;
                }
            }

            for referenced in entry.referenced_tags() {
                match normalize_tag(referenced) {
                    Ok(found) if found != tag.as_str() => {
                        if storage.enqueue_candidate(&found, tag.as_str())? {
                            discovered += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Ignoring referenced tag {}: {}", referenced, e),
                }
            }
        }

        let summary = format!(
            "archived {} of {} wars, discovered {} new tags",
            archived, terminal, discovered
        );
        storage.mark_result(tag.as_str(), CandidateStatus::Done, &summary)?;
        if archived > 0 {
            tracing::info!("{}: {}", tag, summary);
        }

        Ok(TagOutcome::Done {
            archived,
            terminal,
            discovered,
        })
    }
}
