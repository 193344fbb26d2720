//! Storage module for persisting archiver state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The scan ledger (cursor and candidates)
//! - Idempotent war and attack persistence
//! - Crash recovery and operator actions

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::CrawlerConfig;
use crate::state::CandidateStatus;
use crate::ArchiverError;

use std::path::Path;
use std::time::Duration;

/// Source label for tags enqueued from configuration
pub const SOURCE_SEED: &str = "seed";

/// Source label for tags produced by the enumerator
pub const SOURCE_BRUTE_FORCE: &str = "brute-force";

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(ArchiverError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ArchiverError> {
    SqliteStorage::new(path)
}

/// Represents a tag in the scan ledger
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub id: i64,
    pub tag: String,
    /// `seed`, `brute-force`, or the tag whose war log referenced this one
    pub discovered_from: String,
    pub status: CandidateStatus,
    pub note: Option<String>,
    pub attempts: u32,
    /// Earliest time a transiently failed tag may be reserved again
    pub retry_after: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Candidate counts grouped by how the tag entered the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub seed: u64,
    pub brute_force: u64,
    pub discovered: u64,
}

impl SourceCounts {
    pub fn total(&self) -> u64 {
        self.seed + self.brute_force + self.discovered
    }
}

/// Backoff applied to tags after a transient failure
///
/// A failed tag waits `base_delay` before its first retry; the delay doubles
/// per attempt up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transient failures tolerated before a tag is marked failed
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_transient_attempts,
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            max_delay: Duration::from_millis(config.retry_backoff_max_ms),
        }
    }

    /// Delay before the next try of a tag that has failed `attempts` times
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}
