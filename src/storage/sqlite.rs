//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! One connection sits behind a mutex; composite operations hold the lock for
//! the whole transaction.

use crate::state::CandidateStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CandidateRecord, RetryPolicy, SourceCounts, SOURCE_BRUTE_FORCE, SOURCE_SEED,
};
use crate::tag::compare_tags;
use crate::war::{AttackRecord, WarRecord, WarResult};
use crate::ArchiverError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Key of the single cursor row
const CURSOR_KEY: &str = "brute-force";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// Microsecond timestamps keep `updated_at` ordering stable within a second
fn now() -> String {
    timestamp(Utc::now())
}

/// One fixed-width format, so stored timestamps compare correctly as text
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_after(delay: Duration) -> String {
    let now = Utc::now();
    let at = chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now);
    timestamp(at)
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(ArchiverError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ArchiverError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, ArchiverError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<CandidateRecord> {
    Ok(CandidateRecord {
        id: row.get(0)?,
        tag: row.get(1)?,
        discovered_from: row.get(2)?,
        status: CandidateStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(CandidateStatus::Failed),
        note: row.get(4)?,
        attempts: row.get(5)?,
        retry_after: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn war_from_row(row: &Row<'_>) -> rusqlite::Result<WarRecord> {
    Ok(WarRecord {
        end_time: row.get(0)?,
        clan_tag: row.get(1)?,
        opponent_tag: row.get(2)?,
        opponent_name: row.get(3)?,
        team_size: row.get(4)?,
        clan_stars: row.get(5)?,
        opponent_stars: row.get(6)?,
        clan_destruction: row.get(7)?,
        opponent_destruction: row.get(8)?,
        attacks_used: row.get(9)?,
        result: WarResult::parse(&row.get::<_, String>(10)?).unwrap_or(WarResult::Tie),
        is_league_war: row.get(11)?,
        violation_count: row.get(12)?,
    })
}

fn attack_from_row(row: &Row<'_>) -> rusqlite::Result<AttackRecord> {
    Ok(AttackRecord {
        war_key: row.get(0)?,
        attacker_tag: row.get(1)?,
        attacker_name: row.get(2)?,
        defender_tag: row.get(3)?,
        stars: row.get(4)?,
        destruction: row.get(5)?,
        order: row.get(6)?,
        is_violation: row.get(7)?,
    })
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

impl Storage for SqliteStorage {
    // ===== Scan Cursor =====

    fn get_cursor(&self) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let tag = conn
            .query_row(
                "SELECT tag FROM scan_cursor WHERE key = ?1",
                params![CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(tag)
    }

    fn set_cursor(&self, tag: &str) -> StorageResult<()> {
        if compare_tags(tag, tag).is_none() {
            return Err(StorageError::UnorderedTag(tag.to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT tag FROM scan_cursor WHERE key = ?1",
                params![CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(current) = current {
            match compare_tags(tag, &current) {
                Some(Ordering::Less) => {
                    return Err(StorageError::CursorRewind {
                        current,
                        attempted: tag.to_string(),
                    });
                }
                Some(Ordering::Equal) => return Ok(()),
                // A foreign stored value is simply overwritten
                Some(Ordering::Greater) | None => {}
            }
        }

        tx.execute(
            "INSERT INTO scan_cursor (key, tag, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET tag = excluded.tag, updated_at = excluded.updated_at",
            params![CURSOR_KEY, tag, now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn reset_cursor(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM scan_cursor WHERE key = ?1",
            params![CURSOR_KEY],
        )?;
        Ok(())
    }

    // ===== Scan Candidates =====

    fn enqueue_candidate(&self, tag: &str, discovered_from: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let ts = now();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO scan_candidates
             (tag, discovered_from, status, attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![
                tag,
                discovered_from,
                CandidateStatus::Pending.to_db_string(),
                ts
            ],
        )?;
        Ok(inserted > 0)
    }

    fn reserve_candidates(&self, limit: usize) -> StorageResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ts = now();
        let claimed: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, tag FROM scan_candidates
                 WHERE status = ?1 AND (retry_after IS NULL OR retry_after <= ?2)
                 ORDER BY updated_at, id LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![CandidateStatus::Pending.to_db_string(), ts, limit as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        for (id, _) in &claimed {
            tx.execute(
                "UPDATE scan_candidates SET status = ?1, retry_after = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![CandidateStatus::Reserved.to_db_string(), ts, id],
            )?;
        }
        tx.commit()?;

        Ok(claimed.into_iter().map(|(_, tag)| tag).collect())
    }

    fn mark_result(&self, tag: &str, status: CandidateStatus, note: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE scan_candidates SET status = ?1, note = ?2, updated_at = ?3 WHERE tag = ?4",
            params![status.to_db_string(), note, now(), tag],
        )?;
        if updated == 0 {
            return Err(StorageError::CandidateNotFound(tag.to_string()));
        }
        Ok(())
    }

    fn record_transient(
        &self,
        tag: &str,
        note: &str,
        policy: &RetryPolicy,
    ) -> StorageResult<CandidateStatus> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let attempts: u32 = tx
            .query_row(
                "SELECT attempts FROM scan_candidates WHERE tag = ?1",
                params![tag],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::CandidateNotFound(tag.to_string()))?;

        let attempts = attempts.saturating_add(1);
        let (status, retry_after) = if attempts >= policy.max_attempts {
            (CandidateStatus::Failed, None)
        } else {
            (
                CandidateStatus::Pending,
                Some(timestamp_after(policy.delay_for(attempts))),
            )
        };

        tx.execute(
            "UPDATE scan_candidates
             SET status = ?1, note = ?2, attempts = ?3, retry_after = ?4, updated_at = ?5
             WHERE tag = ?6",
            params![status.to_db_string(), note, attempts, retry_after, now(), tag],
        )?;
        tx.commit()?;

        Ok(status)
    }

    fn count_awaiting_retry(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scan_candidates WHERE status = ?1 AND retry_after IS NOT NULL",
            params![CandidateStatus::Pending.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_candidate(&self, tag: &str) -> StorageResult<Option<CandidateRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, tag, discovered_from, status, note, attempts, retry_after, created_at, updated_at
                 FROM scan_candidates WHERE tag = ?1",
                params![tag],
                candidate_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn release_reservations(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let released = conn.execute(
            "UPDATE scan_candidates SET status = ?1, updated_at = ?2 WHERE status = ?3",
            params![
                CandidateStatus::Pending.to_db_string(),
                now(),
                CandidateStatus::Reserved.to_db_string()
            ],
        )?;
        Ok(released)
    }

    fn requeue_failed(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let requeued = conn.execute(
            "UPDATE scan_candidates
             SET status = ?1, attempts = 0, note = NULL, retry_after = NULL, updated_at = ?2
             WHERE status = ?3",
            params![
                CandidateStatus::Pending.to_db_string(),
                now(),
                CandidateStatus::Failed.to_db_string()
            ],
        )?;
        Ok(requeued)
    }

    // ===== Wars =====

    fn war_exists(&self, end_time: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM wars WHERE end_time = ?1",
                params![end_time],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save_war(&self, war: &WarRecord, attacks: &[AttackRecord]) -> StorageResult<()> {
        if let Some(foreign) = attacks.iter().find(|a| a.war_key != war.end_time) {
            return Err(StorageError::ForeignAttack {
                expected: war.end_time.clone(),
                found: foreign.war_key.clone(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO wars (end_time, clan_tag, opponent_tag, opponent_name, team_size,
             clan_stars, opponent_stars, clan_destruction, opponent_destruction, attacks_used,
             result, is_league_war, violation_count, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(end_time) DO UPDATE SET
                clan_tag = excluded.clan_tag,
                opponent_tag = excluded.opponent_tag,
                opponent_name = excluded.opponent_name,
                team_size = excluded.team_size,
                clan_stars = excluded.clan_stars,
                opponent_stars = excluded.opponent_stars,
                clan_destruction = excluded.clan_destruction,
                opponent_destruction = excluded.opponent_destruction,
                attacks_used = excluded.attacks_used,
                result = excluded.result,
                is_league_war = excluded.is_league_war,
                violation_count = excluded.violation_count,
                archived_at = excluded.archived_at",
            params![
                war.end_time,
                war.clan_tag,
                war.opponent_tag,
                war.opponent_name,
                war.team_size,
                war.clan_stars,
                war.opponent_stars,
                war.clan_destruction,
                war.opponent_destruction,
                war.attacks_used,
                war.result.as_str(),
                war.is_league_war,
                war.violation_count,
                now(),
            ],
        )?;

        tx.execute(
            "DELETE FROM war_attacks WHERE war_key = ?1",
            params![war.end_time],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO war_attacks (war_key, attacker_tag, attacker_name, defender_tag,
                 stars, destruction, attack_order, is_violation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for attack in attacks {
                stmt.execute(params![
                    attack.war_key,
                    attack.attacker_tag,
                    attack.attacker_name,
                    attack.defender_tag,
                    attack.stars,
                    attack.destruction,
                    attack.order,
                    attack.is_violation,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_war(&self, end_time: &str) -> StorageResult<Option<WarRecord>> {
        let conn = self.lock()?;
        let war = conn
            .query_row(
                "SELECT end_time, clan_tag, opponent_tag, opponent_name, team_size, clan_stars,
                 opponent_stars, clan_destruction, opponent_destruction, attacks_used, result,
                 is_league_war, violation_count
                 FROM wars WHERE end_time = ?1",
                params![end_time],
                war_from_row,
            )
            .optional()?;
        Ok(war)
    }

    fn get_attacks(&self, end_time: &str) -> StorageResult<Vec<AttackRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT war_key, attacker_tag, attacker_name, defender_tag, stars, destruction,
             attack_order, is_violation
             FROM war_attacks WHERE war_key = ?1 ORDER BY attack_order, id",
        )?;
        let attacks = stmt
            .query_map(params![end_time], attack_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attacks)
    }

    // ===== Statistics =====

    fn count_candidates_by_status(&self) -> StorageResult<HashMap<CandidateStatus, u64>> {
        let conn = self.lock()?;
        let mut counts: HashMap<CandidateStatus, u64> = CandidateStatus::all_statuses()
            .into_iter()
            .map(|s| (s, 0))
            .collect();

        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM scan_candidates GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, n) = row?;
            if let Some(status) = CandidateStatus::from_db_string(&status) {
                counts.insert(status, n.max(0) as u64);
            }
        }

        Ok(counts)
    }

    fn count_candidates_by_source(&self) -> StorageResult<SourceCounts> {
        let conn = self.lock()?;
        let mut counts = SourceCounts::default();

        let mut stmt = conn.prepare(
            "SELECT discovered_from, COUNT(*) FROM scan_candidates GROUP BY discovered_from",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (source, n) = row?;
            let n = n.max(0) as u64;
            match source.as_str() {
                SOURCE_SEED => counts.seed += n,
                SOURCE_BRUTE_FORCE => counts.brute_force += n,
                _ => counts.discovered += n,
            }
        }

        Ok(counts)
    }

    fn count_candidates(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        count(&conn, "SELECT COUNT(*) FROM scan_candidates")
    }

    fn count_wars(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        count(&conn, "SELECT COUNT(*) FROM wars")
    }

    fn count_attacks(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        count(&conn, "SELECT COUNT(*) FROM war_attacks")
    }

    fn total_violations(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        count(&conn, "SELECT COALESCE(SUM(violation_count), 0) FROM wars")
    }
}
