//! Statistics generation from the archive database
//!
//! This module provides functionality for extracting and displaying
//! ledger and archive statistics from the storage layer.

use crate::state::CandidateStatus;
use crate::storage::{SourceCounts, Storage};
use crate::ArchiverError;
use std::collections::HashMap;
use std::fmt::Write;

/// Ledger and archive statistics summary
#[derive(Debug, Clone)]
pub struct ScanStatistics {
    /// Total number of tags in the ledger
    pub total_candidates: u64,

    /// Count of tags by status (every status present)
    pub candidates_by_status: HashMap<CandidateStatus, u64>,

    /// Count of tags by how they entered the ledger
    pub candidates_by_source: SourceCounts,

    /// Last tag emitted by the enumerator
    pub cursor: Option<String>,

    pub total_wars: u64,
    pub total_attacks: u64,

    /// Sum of violation counts over all archived wars
    pub total_violations: u64,

    /// Pending tags backing off after a transient failure
    pub awaiting_retry: u64,
}

impl ScanStatistics {
    pub fn count(&self, status: CandidateStatus) -> u64 {
        self.candidates_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Tags the crawler has yet to finish
    pub fn remaining(&self) -> u64 {
        self.candidates_by_status
            .iter()
            .filter(|(status, _)| !status.is_terminal())
            .map(|(_, count)| count)
            .sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ScanStatistics)` - Successfully loaded statistics
/// * `Err(ArchiverError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<ScanStatistics, ArchiverError> {
    Ok(ScanStatistics {
        total_candidates: storage.count_candidates()?,
        candidates_by_status: storage.count_candidates_by_status()?,
        candidates_by_source: storage.count_candidates_by_source()?,
        cursor: storage.get_cursor()?,
        total_wars: storage.count_wars()?,
        total_attacks: storage.count_attacks()?,
        total_violations: storage.total_violations()?,
        awaiting_retry: storage.count_awaiting_retry()?,
    })
}

/// Renders statistics as the text shown by `--stats`
pub fn format_statistics(stats: &ScanStatistics) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "=== Archive Statistics ===\n");

    let _ = writeln!(out, "Ledger:");
    let _ = writeln!(out, "  Total tags: {}", stats.total_candidates);
    let _ = writeln!(
        out,
        "  Remaining: {} ({} awaiting retry)",
        stats.remaining(),
        stats.awaiting_retry
    );
    let _ = writeln!(
        out,
        "  Brute-force cursor: {}",
        stats.cursor.as_deref().unwrap_or("(not started)")
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Tags by Status:");
    for status in CandidateStatus::all_statuses() {
        let count = stats.count(status);
        let percentage = if stats.total_candidates > 0 {
            (count as f64 / stats.total_candidates as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, percentage);
    }
    let _ = writeln!(out);

    let sources = &stats.candidates_by_source;
    let _ = writeln!(out, "Tags by Source:");
    let _ = writeln!(out, "  seed: {}", sources.seed);
    let _ = writeln!(out, "  brute-force: {}", sources.brute_force);
    let _ = writeln!(out, "  discovered: {}", sources.discovered);
    let _ = writeln!(out);

    let _ = writeln!(out, "Archive:");
    let _ = writeln!(out, "  Wars: {}", stats.total_wars);
    let _ = writeln!(out, "  Attacks: {}", stats.total_attacks);
    let _ = writeln!(out, "  Attack violations: {}", stats.total_violations);

    out
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ScanStatistics) {
    print!("{}", format_statistics(stats));
}
