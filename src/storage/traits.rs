//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::CandidateStatus;
use crate::storage::{CandidateRecord, RetryPolicy, SourceCounts};
use crate::war::{AttackRecord, WarRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("Cursor cannot move back from {current} to {attempted}")]
    CursorRewind { current: String, attempted: String },

    #[error("Tag outside the enumeration order: {0}")]
    UnorderedTag(String),

    #[error("Attack belongs to war {found}, expected {expected}")]
    ForeignAttack { expected: String, found: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method takes `&self`; implementations serialize access internally so
/// one instance can be shared across tasks behind an `Arc`. Composite writes
/// are atomic.
pub trait Storage: Send + Sync {
    // ===== Scan Cursor =====

    /// Gets the last tag emitted by the enumerator
    fn get_cursor(&self) -> StorageResult<Option<String>>;

    /// Advances the cursor
    ///
    /// Setting the current value again is a no-op. A tag that precedes the
    /// stored cursor in enumeration order is rejected with
    /// `StorageError::CursorRewind`.
    fn set_cursor(&self, tag: &str) -> StorageResult<()>;

    /// Clears the cursor so enumeration restarts from the first tag
    fn reset_cursor(&self) -> StorageResult<()>;

    // ===== Scan Candidates =====

    /// Adds a tag to the ledger if it is not already known
    ///
    /// # Arguments
    ///
    /// * `tag` - The canonical tag
    /// * `discovered_from` - How the tag was found
    ///
    /// # Returns
    ///
    /// True if a new row was inserted, false if the tag was already known
    fn enqueue_candidate(&self, tag: &str, discovered_from: &str) -> StorageResult<bool>;

    /// Atomically claims up to `limit` pending tags
    ///
    /// Claimed rows move to `reserved`; oldest `updated_at` first. Rows whose
    /// retry backoff has not elapsed are left alone. Two callers never receive
    /// the same tag.
    fn reserve_candidates(&self, limit: usize) -> StorageResult<Vec<String>>;

    /// Records the outcome of processing a tag
    fn mark_result(&self, tag: &str, status: CandidateStatus, note: &str) -> StorageResult<()>;

    /// Records a transient failure
    ///
    /// Increments `attempts`; the tag goes back to `pending` with a
    /// `retry_after` from the policy's backoff, or to `failed` once
    /// `attempts` reaches `policy.max_attempts`. A pending tag is not
    /// reserved again before its `retry_after`.
    ///
    /// # Returns
    ///
    /// The status the tag ended up in
    fn record_transient(
        &self,
        tag: &str,
        note: &str,
        policy: &RetryPolicy,
    ) -> StorageResult<CandidateStatus>;

    /// Counts pending tags whose retry after a transient failure has not been
    /// reserved yet, whether or not the backoff has elapsed
    fn count_awaiting_retry(&self) -> StorageResult<u64>;

    /// Gets a candidate by tag
    fn get_candidate(&self, tag: &str) -> StorageResult<Option<CandidateRecord>>;

    /// Moves every `reserved` tag back to `pending` (crash recovery)
    fn release_reservations(&self) -> StorageResult<usize>;

    /// Moves every `failed` tag back to `pending` and clears its attempts
    fn requeue_failed(&self) -> StorageResult<usize>;

    // ===== Wars =====

    /// Returns true if a war with this end time is archived
    fn war_exists(&self, end_time: &str) -> StorageResult<bool>;

    /// Upserts a war and replaces its attack set in one transaction
    fn save_war(&self, war: &WarRecord, attacks: &[AttackRecord]) -> StorageResult<()>;

    /// Gets an archived war by end time
    fn get_war(&self, end_time: &str) -> StorageResult<Option<WarRecord>>;

    /// Gets the attacks of a war ordered by attack order
    fn get_attacks(&self, end_time: &str) -> StorageResult<Vec<AttackRecord>>;

    // ===== Statistics =====

    /// Counts candidates per status; every status is present in the map
    fn count_candidates_by_status(&self) -> StorageResult<HashMap<CandidateStatus, u64>>;

    /// Counts candidates by how they entered the ledger
    fn count_candidates_by_source(&self) -> StorageResult<SourceCounts>;

    /// Gets total candidate count
    fn count_candidates(&self) -> StorageResult<u64>;

    /// Gets total archived war count
    fn count_wars(&self) -> StorageResult<u64>;

    /// Gets total archived attack count
    fn count_attacks(&self) -> StorageResult<u64>;

    /// Sums `violation_count` over every archived war
    fn total_violations(&self) -> StorageResult<u64>;
}
