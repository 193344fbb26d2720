//! Idempotent archival of one war log entry

use crate::api::WarLogEntry;
use crate::storage::{Storage, StorageError};
use crate::tag::ClanTag;
use crate::war::{normalize_entry, parse_api_time, war_key, NormalizeError};

/// What happened to one terminal war log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Newly written to the store
    Archived { end_time: String },
    /// The store already held a war with this end time
    AlreadyArchived { end_time: String },
    /// The entry could not be normalized; nothing was written
    Unreadable(NormalizeError),
}

/// Normalizes and stores `entry` unless its end time is already archived
///
/// Only store failures are errors; a malformed entry is reported as
/// `ArchiveOutcome::Unreadable` so callers can move on to the next one.
pub fn archive_entry(
    storage: &dyn Storage,
    entry: &WarLogEntry,
    clan_tag: &ClanTag,
) -> Result<ArchiveOutcome, StorageError> {
    let end_raw = match entry.end_time.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(ArchiveOutcome::Unreadable(NormalizeError::MissingEndTime)),
    };
    let end_time = match parse_api_time(end_raw) {
        Ok(end) => war_key(end),
        Err(e) => return Ok(ArchiveOutcome::Unreadable(e)),
    };

    if storage.war_exists(&end_time)? {
        return Ok(ArchiveOutcome::AlreadyArchived { end_time });
    }

    let normalized = match normalize_entry(entry, clan_tag) {
        Ok(n) => n,
        Err(e) => return Ok(ArchiveOutcome::Unreadable(e)),
    };
    storage.save_war(&normalized.war, &normalized.attacks)?;

    Ok(ArchiveOutcome::Archived { end_time })
}
