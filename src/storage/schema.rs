//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the archive database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Last tag emitted by the enumerator (single keyed row)
CREATE TABLE IF NOT EXISTS scan_cursor (
    key TEXT PRIMARY KEY,
    tag TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Every tag the crawler has ever known about
CREATE TABLE IF NOT EXISTS scan_candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag TEXT NOT NULL UNIQUE,
    discovered_from TEXT NOT NULL,
    status TEXT NOT NULL,
    note TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    retry_after TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_candidates_status ON scan_candidates(status, updated_at);
CREATE INDEX IF NOT EXISTS idx_candidates_source ON scan_candidates(discovered_from);

-- Archived wars, keyed by canonical end time
CREATE TABLE IF NOT EXISTS wars (
    end_time TEXT PRIMARY KEY,
    clan_tag TEXT NOT NULL,
    opponent_tag TEXT,
    opponent_name TEXT NOT NULL,
    team_size INTEGER NOT NULL,
    clan_stars INTEGER NOT NULL,
    opponent_stars INTEGER NOT NULL,
    clan_destruction REAL NOT NULL,
    opponent_destruction REAL NOT NULL,
    attacks_used INTEGER NOT NULL,
    result TEXT NOT NULL,
    is_league_war INTEGER NOT NULL DEFAULT 0,
    violation_count INTEGER NOT NULL DEFAULT 0,
    archived_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wars_clan ON wars(clan_tag);

-- Attacks made by the archived clan in each war
CREATE TABLE IF NOT EXISTS war_attacks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    war_key TEXT NOT NULL REFERENCES wars(end_time) ON DELETE CASCADE,
    attacker_tag TEXT NOT NULL,
    attacker_name TEXT NOT NULL,
    defender_tag TEXT NOT NULL,
    stars INTEGER NOT NULL,
    destruction REAL NOT NULL,
    attack_order INTEGER NOT NULL,
    is_violation INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_war_attacks_war ON war_attacks(war_key);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Ledgers created before retry backoff existed lack the column
    if !has_column(conn, "scan_candidates", "retry_after")? {
        conn.execute_batch("ALTER TABLE scan_candidates ADD COLUMN retry_after TEXT;")?;
    }

    Ok(())
}

fn has_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> Result<bool, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}
