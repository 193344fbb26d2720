//! Canonical war records and the normalizer that produces them
//!
//! Raw API payloads are loosely typed; everything downstream of this module
//! works with `WarRecord` and `AttackRecord`, whose fields always hold a
//! defined value.

mod archive;
mod normalize;

pub use archive::{archive_entry, ArchiveOutcome};
pub use normalize::{
    count_violations, derive_result, normalize_entry, parse_api_time, war_key,
    EXPECTED_ATTACKS_PER_MEMBER,
};

use std::fmt;
use thiserror::Error;

/// Errors raised while normalizing a war payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("War has no end time")]
    MissingEndTime,

    #[error("Unrecognized timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Outcome of a war from the archived clan's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarResult {
    Win,
    Lose,
    Tie,
}

impl WarResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Tie => "tie",
        }
    }

    /// Parses the API's result field; unknown values yield None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Some(Self::Win),
            "lose" | "loss" => Some(Self::Lose),
            "tie" | "draw" => Some(Self::Tie),
            _ => None,
        }
    }
}

impl fmt::Display for WarResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished war, keyed by its end time
///
/// Defaults for values the API may omit:
///
/// | Field | Default |
/// |-------|---------|
/// | `clan_tag` | the tag whose log was read |
/// | `opponent_tag` | None |
/// | `opponent_name` | `"Unknown"` |
/// | `team_size` | number of listed members, else 0 |
/// | stars / destruction | 0 |
/// | `attacks_used` | clan attack count, else attacks listed on members |
/// | `result` | derived from stars |
/// | `is_league_war` | false unless flagged as `cwl` or one attack per member |
#[derive(Debug, Clone, PartialEq)]
pub struct WarRecord {
    /// Canonical RFC 3339 end time; the idempotency key
    pub end_time: String,
    pub clan_tag: String,
    pub opponent_tag: Option<String>,
    pub opponent_name: String,
    pub team_size: u32,
    pub clan_stars: u32,
    pub opponent_stars: u32,
    pub clan_destruction: f64,
    pub opponent_destruction: f64,
    pub attacks_used: u32,
    pub result: WarResult,
    pub is_league_war: bool,
    pub violation_count: u32,
}

/// One attack made by the archived clan, child of a `WarRecord`
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRecord {
    /// End time of the owning war
    pub war_key: String,
    pub attacker_tag: String,
    pub attacker_name: String,
    pub defender_tag: String,
    pub stars: u32,
    pub destruction: f64,
    pub order: u32,
    /// Attacker used fewer attacks than expected
    pub is_violation: bool,
}

/// Output of the normalizer: one war and its attack set
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWar {
    pub war: WarRecord,
    pub attacks: Vec<AttackRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_parse() {
        assert_eq!(WarResult::parse("win"), Some(WarResult::Win));
        assert_eq!(WarResult::parse("LOSE"), Some(WarResult::Lose));
        assert_eq!(WarResult::parse("tie"), Some(WarResult::Tie));
        assert_eq!(WarResult::parse(""), None);
    }

    #[test]
    fn test_result_display() {
        assert_eq!(WarResult::Win.to_string(), "win");
        assert_eq!(WarResult::Lose.to_string(), "lose");
    }
}
