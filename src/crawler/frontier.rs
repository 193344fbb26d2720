//! Frontier manager: keeps the work queue fed
//!
//! Pending ledger rows always win over brute force; rows backing off after a
//! transient failure wait until their retry time while enumeration goes on. Only when nothing can be
//! reserved does the manager generate the next enumerated tag, record it in
//! the ledger and advance the cursor (in that order, so a crash between the
//! two steps replays the same tag instead of skipping it).

use crate::state::CandidateStatus;
use crate::storage::{Storage, SOURCE_BRUTE_FORCE};
use crate::tag::{ClanTag, TagEnumerator, TAG_PREFIX};
use crate::ArchiverError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// One unit of work handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Tag(ClanTag),
    /// Sentinel: the receiving worker exits
    Shutdown,
}

/// What the frontier did during a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierReport {
    /// Tags moved from the ledger onto the queue
    pub dispatched: u64,
    /// Brute-force tags produced by the enumerator
    pub generated: u64,
    /// The enumerator ran out of tags
    pub exhausted: bool,
}

/// Feeds ledger candidates to the worker queue
pub struct FrontierManager {
    storage: Arc<dyn Storage>,
    enumerator: TagEnumerator,
    tx: mpsc::Sender<WorkItem>,
    in_flight: Arc<AtomicUsize>,
    workers: usize,
    idle_poll: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl FrontierManager {
    /// Creates a frontier manager
    ///
    /// # Arguments
    ///
    /// * `storage` - The ledger
    /// * `enumerator` - Brute-force tag source
    /// * `tx` - Sending half of the bounded work queue
    /// * `in_flight` - Tags sent to the queue and not yet finished by a worker
    /// * `workers` - Number of shutdown sentinels to send at the end
    /// * `idle_poll` - Sleep between ledger polls while nothing is pending
    /// * `shutdown_tx` - Crawl-wide shutdown signal
    pub fn new(
        storage: Arc<dyn Storage>,
        enumerator: TagEnumerator,
        tx: mpsc::Sender<WorkItem>,
        in_flight: Arc<AtomicUsize>,
        workers: usize,
        idle_poll: Duration,
        shutdown_tx: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            storage,
            enumerator,
            tx,
            in_flight,
            workers,
            idle_poll,
            shutdown_tx,
        }
    }

    /// Runs until the tag space is exhausted and all work is done, or until
    /// shutdown; then sends one sentinel per worker
    pub async fn run(self) -> Result<FrontierReport, ArchiverError> {
        let result = self.fill().await;

        if let Err(e) = &result {
            tracing::error!("Frontier stopped: {}", e);
            self.shutdown_tx.send_replace(true);
        }

        for _ in 0..self.workers {
            if self.tx.send(WorkItem::Shutdown).await.is_err() {
                break;
            }
        }

        result
    }

    async fn fill(&self) -> Result<FrontierReport, ArchiverError> {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut report = FrontierReport::default();

        loop {
            if *shutdown.borrow() {
                tracing::info!("Frontier received shutdown signal");
                break;
            }

            let spare = self.tx.capacity();
            if spare == 0 {
                tokio::select! {
                    permit = self.tx.reserve() => {
                        if permit.is_err() {
                            break;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }

            // Sampled before reserving: if nothing was in flight, every worker's
            // discoveries are already committed to the ledger.
            let idle = self.in_flight.load(Ordering::SeqCst) == 0;

            let reserved = self.storage.reserve_candidates(spare)?;
            if !reserved.is_empty() {
                if !self.dispatch(reserved, &mut report).await? {
                    break;
                }
                continue;
            }

            if !report.exhausted {
                match self.next_brute_force_tag()? {
                    Some(tag) => {
                        self.storage.enqueue_candidate(&tag, SOURCE_BRUTE_FORCE)?;
                        self.storage.set_cursor(&tag)?;
                        report.generated += 1;
                        tracing::trace!("Generated brute-force tag {}", tag);
                        continue;
                    }
                    None => {
                        tracing::info!("Tag space exhausted; serving remaining candidates");
                        report.exhausted = true;
                    }
                }
            }

            if idle {
                let awaiting = self.storage.count_awaiting_retry()?;
                if awaiting == 0 {
                    tracing::info!("No pending candidates and no work in flight");
                    break;
                }
                tracing::trace!("{} tags waiting out their retry backoff", awaiting);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.idle_poll) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Sends reserved tags to the queue; returns false if every worker is gone
    async fn dispatch(
        &self,
        reserved: Vec<String>,
        report: &mut FrontierReport,
    ) -> Result<bool, ArchiverError> {
        let mut tags = reserved.into_iter();

        while let Some(raw) = tags.next() {
            let tag = match ClanTag::parse(&raw) {
                Ok(tag) => tag,
                Err(e) => {
                    tracing::warn!("Skipping unparseable ledger tag {}: {}", raw, e);
                    self.storage
                        .mark_result(&raw, CandidateStatus::Skipped, &e.to_string())?;
                    continue;
                }
            };

            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if self.tx.send(WorkItem::Tag(tag)).await.is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                tracing::warn!("Work queue closed; releasing reserved tags");
                self.storage.release_reservations()?;
                return Ok(false);
            }
            report.dispatched += 1;
        }

        Ok(true)
    }

    /// Next tag after the stored cursor, or None when the space is exhausted
    ///
    /// A cursor the enumerator does not recognize (for example after the
    /// length bounds changed) restarts enumeration only when it is shorter
    /// than the configured minimum; a longer one counts as exhausted.
    fn next_brute_force_tag(&self) -> Result<Option<String>, ArchiverError> {
        let cursor = self.storage.get_cursor()?;

        let next = match cursor.as_deref() {
            Some(c) if self.enumerator.compare(c, c).is_none() => {
                let body_len = c.trim_start_matches(TAG_PREFIX).len();
                if body_len < self.enumerator.min_length() {
                    Some(self.enumerator.first())
                } else {
                    tracing::warn!(
                        "Cursor {} lies outside the configured tag lengths; use --reset-cursor to restart",
                        c
                    );
                    None
                }
            }
            other => self.enumerator.next_after(other),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    fn frontier(
        storage: Arc<dyn Storage>,
        capacity: usize,
        in_flight: Arc<AtomicUsize>,
    ) -> (FrontierManager, mpsc::Receiver<WorkItem>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown_tx, _) = watch::channel(false);
        let enumerator = TagEnumerator::new(7, 7).unwrap();
        let manager = FrontierManager::new(
            storage,
            enumerator,
            tx,
            in_flight,
            1,
            Duration::from_millis(10),
            Arc::new(shutdown_tx),
        );
        (manager, rx)
    }

    #[tokio::test]
    async fn test_pending_candidates_come_first() {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new_in_memory().unwrap());
        storage.enqueue_candidate("#2PP2PQ9L", "seed").unwrap();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let (manager, mut rx) = frontier(Arc::clone(&storage), 1, Arc::clone(&in_flight));
        let handle = tokio::spawn(manager.run());

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            WorkItem::Tag(ClanTag::parse("#2PP2PQ9L").unwrap())
        );

        // The next item is generated by brute force
        let second = rx.recv().await.unwrap();
        assert_eq!(second, WorkItem::Tag(ClanTag::parse("#0000000").unwrap()));
        let generated = storage.get_candidate("#0000000").unwrap().unwrap();
        assert_eq!(generated.discovered_from, SOURCE_BRUTE_FORCE);
        assert!(storage.get_cursor().unwrap().is_some());

        drop(rx);
        let report = handle.await.unwrap().unwrap();
        assert!(report.generated >= 1);
    }

    #[tokio::test]
    async fn test_exhausted_cursor_finishes_when_idle() {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new_in_memory().unwrap());
        storage.set_cursor("#VVVVVVV").unwrap();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let (manager, mut rx) = frontier(Arc::clone(&storage), 4, in_flight);
        let report = manager.run().await.unwrap();

        assert!(report.exhausted);
        assert_eq!(report.generated, 0);
        assert_eq!(rx.recv().await, Some(WorkItem::Shutdown));
    }

    #[tokio::test]
    async fn test_shutdown_sends_sentinels() {
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let (tx, mut rx) = mpsc::channel(4);
        let (shutdown_tx, _) = watch::channel(true);
        let manager = FrontierManager::new(
            storage,
            TagEnumerator::new(7, 9).unwrap(),
            tx,
            Arc::new(AtomicUsize::new(0)),
            3,
            Duration::from_millis(10),
            Arc::new(shutdown_tx),
        );

        let report = manager.run().await.unwrap();
        assert_eq!(report, FrontierReport::default());
        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(WorkItem::Shutdown));
        }
    }
}
