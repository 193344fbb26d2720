//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the crawl together:
//! - Startup recovery (seed tags, stale reservations)
//! - One frontier task feeding a bounded queue
//! - A fixed pool of workers draining it
//! - Joining everything and surfacing a fatal API error

use crate::api::ApiClient;
use crate::config::CrawlerConfig;
use crate::crawler::frontier::{FrontierManager, FrontierReport, WorkItem};
use crate::crawler::limiter::RequestLimiter;
use crate::crawler::worker::{CrawlProgress, CrawlReport, Worker, WorkerShared};
use crate::storage::{RetryPolicy, Storage, SOURCE_SEED};
use crate::tag::{ClanTag, TagEnumerator};
use crate::ArchiverError;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};

/// Work done before the first tag is dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Seed tags that were new to the ledger
    pub seeded: usize,
    /// Tags left `reserved` by an earlier process, now `pending` again
    pub recovered: usize,
}

/// Everything a finished crawl reports
#[derive(Debug, Clone, Copy)]
pub struct CrawlSummary {
    pub startup: StartupReport,
    pub frontier: FrontierReport,
    pub workers: CrawlReport,
    pub elapsed: Duration,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: CrawlerConfig,
    api: Arc<dyn ApiClient>,
    storage: Arc<dyn Storage>,
    limiter: Arc<RequestLimiter>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    enumerator: TagEnumerator,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The `[crawler]` section
    /// * `api` - Game-data API client
    /// * `storage` - Ledger and war store
    /// * `limiter` - Request pacing shared with the live war monitor
    /// * `shutdown_tx` - Crawl-wide shutdown signal
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ArchiverError)` - The tag length bounds are invalid
    pub fn new(
        config: CrawlerConfig,
        api: Arc<dyn ApiClient>,
        storage: Arc<dyn Storage>,
        limiter: Arc<RequestLimiter>,
        shutdown_tx: Arc<watch::Sender<bool>>,
    ) -> Result<Self, ArchiverError> {
        let enumerator = TagEnumerator::new(config.min_length, config.max_length)?;
        Ok(Self {
            config,
            api,
            storage,
            limiter,
            shutdown_tx,
            enumerator,
        })
    }

    /// Seeds configured tags and recovers reservations from a crashed run
    pub fn prepare(&self) -> Result<StartupReport, ArchiverError> {
        let mut report = StartupReport::default();

        for raw in &self.config.seed_tags {
            let tag = ClanTag::parse(raw)?;
            if self.storage.enqueue_candidate(tag.as_str(), SOURCE_SEED)? {
                report.seeded += 1;
            }
        }

        report.recovered = self.storage.release_reservations()?;
        if report.recovered > 0 {
            tracing::info!(
                "Recovered {} tags reserved by an interrupted run",
                report.recovered
            );
        }

        Ok(report)
    }

    /// Runs the crawl until the tag space is exhausted or shutdown is signaled
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The crawl stopped cleanly
    /// * `Err(ArchiverError)` - A worker hit a fatal API error, a task panicked,
    ///   or the frontier lost its storage
    pub async fn run(&self) -> Result<CrawlSummary, ArchiverError> {
        let started = Instant::now();
        let startup = self.prepare()?;

        tracing::info!(
            "Starting crawl with {} workers (queue capacity {}, tag lengths {}-{}, {} tags in space)",
            self.config.workers,
            self.config.queue_capacity,
            self.config.min_length,
            self.config.max_length,
            self.enumerator.space_size()
        );

        let (tx, rx) = mpsc::channel::<WorkItem>(self.config.queue_capacity);
        let in_flight = Arc::new(AtomicUsize::new(0));

        let frontier = FrontierManager::new(
            Arc::clone(&self.storage),
            self.enumerator.clone(),
            tx,
            Arc::clone(&in_flight),
            self.config.workers,
            Duration::from_millis(self.config.idle_poll_ms),
            Arc::clone(&self.shutdown_tx),
        );
        let frontier_handle = tokio::spawn(frontier.run());

        let shared = Arc::new(WorkerShared {
            api: Arc::clone(&self.api),
            storage: Arc::clone(&self.storage),
            limiter: Arc::clone(&self.limiter),
            queue: Arc::new(Mutex::new(rx)),
            in_flight,
            progress: CrawlProgress::new(self.config.progress_every),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            retry: RetryPolicy::from_config(&self.config),
        });

        let worker_handles: Vec<_> = (0..self.config.workers)
            .map(|id| tokio::spawn(Worker::new(id, Arc::clone(&shared)).run()))
            .collect();
        drop(shared);

        let mut workers = CrawlReport::default();
        let mut fatal: Option<ArchiverError> = None;

        for handle in worker_handles {
            match handle.await {
                Ok(Ok(report)) => workers.merge(&report),
                Ok(Err(e)) => {
                    fatal.get_or_insert(e);
                }
                Err(join_err) => {
                    tracing::error!("Worker task failed: {}", join_err);
                    self.shutdown_tx.send_replace(true);
                    fatal.get_or_insert(ArchiverError::Task(join_err.to_string()));
                }
            }
        }

        let frontier = frontier_handle
            .await
            .map_err(|e| ArchiverError::Task(e.to_string()));

        if let Some(e) = fatal {
            return Err(e);
        }
        let frontier = frontier??;

        let summary = CrawlSummary {
            startup,
            frontier,
            workers,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Crawl stopped after {:?}: {} tags processed ({} done, {} skipped, {} failed), {} wars archived, {} tags discovered",
            summary.elapsed,
            workers.processed,
            workers.done,
            workers.skipped,
            workers.failed,
            workers.wars_archived,
            workers.tags_discovered
        );

        Ok(summary)
    }
}
