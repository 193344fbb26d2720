/// Candidate status definitions for tracking crawl progress
///
/// This module defines every state a scan candidate can be in within the ledger.
use std::fmt;

/// Represents the current state of a tag in the scan ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateStatus {
    // ===== Active States =====
    /// Tag is known and waiting to be reserved by the frontier
    Pending,

    /// Tag has been claimed and is queued for or owned by a worker
    Reserved,

    // ===== Terminal States =====
    /// War log was fetched and every new war archived
    Done,

    /// Tag has no public war data (not found, private, malformed, forbidden)
    Skipped,

    /// Processing hit an unexpected error; requires an operator re-enqueue
    Failed,
}

impl CandidateStatus {
    /// Returns true if this is a terminal state (no further processing planned)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Reserved)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reserved => "reserved",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "reserved" => Some(Self::Reserved),
            "done" => Some(Self::Done),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Reserved,
            Self::Done,
            Self::Skipped,
            Self::Failed,
        ]
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
