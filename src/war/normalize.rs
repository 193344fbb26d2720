//! Transform from raw API payloads to canonical war records
//!
//! Violation heuristic: every member is expected to use exactly
//! `EXPECTED_ATTACKS_PER_MEMBER` attacks. A member contributes
//! `max(0, expected - used)` violations and the clan total is the sum. The
//! heuristic ignores expiry and league rules; league wars get the same
//! treatment.

use crate::api::WarLogEntry;
use crate::tag::{normalize_tag, ClanTag};
use crate::war::{AttackRecord, NormalizeError, NormalizedWar, WarRecord, WarResult};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Attacks each war member is expected to use
pub const EXPECTED_ATTACKS_PER_MEMBER: u32 = 2;

const UNKNOWN_NAME: &str = "Unknown";

/// Compact timestamp layouts used by the API
const API_TIME_FORMATS: &[&str] = &["%Y%m%dT%H%M%S%.fZ", "%Y%m%dT%H%M%SZ"];

/// Derives a result from stars when the payload carries none
///
/// # Examples
///
/// ```
/// use clanwar_archiver::war::{derive_result, WarResult};
///
/// assert_eq!(derive_result(30, 25), WarResult::Win);
/// assert_eq!(derive_result(10, 10), WarResult::Tie);
/// assert_eq!(derive_result(5, 12), WarResult::Lose);
/// ```
pub fn derive_result(clan_stars: u32, opponent_stars: u32) -> WarResult {
    match clan_stars.cmp(&opponent_stars) {
        std::cmp::Ordering::Greater => WarResult::Win,
        std::cmp::Ordering::Less => WarResult::Lose,
        std::cmp::Ordering::Equal => WarResult::Tie,
    }
}

/// Violations for one member, clamped at zero
fn member_violations(attacks_used: u32) -> u32 {
    EXPECTED_ATTACKS_PER_MEMBER.saturating_sub(attacks_used)
}

/// Sums per-member violations given each member's attack count
pub fn count_violations<I>(attacks_per_member: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    attacks_per_member.into_iter().map(member_violations).sum()
}

/// Parses an API timestamp (compact or RFC 3339) into UTC
pub fn parse_api_time(raw: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let trimmed = raw.trim();

    for format in API_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| NormalizeError::InvalidTimestamp(raw.to_string()))
}

/// Canonical idempotency key for a war end time
pub fn war_key(end_time: DateTime<Utc>) -> String {
    end_time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalizes one war log entry
///
/// # Arguments
///
/// * `entry` - The raw entry (war log item or a converted current war)
/// * `clan_tag` - The clan whose log was read; used when the entry omits its own tag
///
/// # Returns
///
/// * `Ok(NormalizedWar)` - The war and its attack set
/// * `Err(NormalizeError)` - The entry has no usable end time
pub fn normalize_entry(
    entry: &WarLogEntry,
    clan_tag: &ClanTag,
) -> Result<NormalizedWar, NormalizeError> {
    let end_raw = entry
        .end_time
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or(NormalizeError::MissingEndTime)?;
    let key = war_key(parse_api_time(end_raw)?);

    let clan = &entry.clan;
    let opponent = &entry.opponent;
    let members = &clan.members;

    let clan_stars = clan.stars.unwrap_or(0);
    let opponent_stars = opponent.stars.unwrap_or(0);

    let listed_attacks: u32 = members.iter().map(|m| m.attacks.len() as u32).sum();

    let result = entry
        .result
        .as_deref()
        .and_then(WarResult::parse)
        .unwrap_or_else(|| derive_result(clan_stars, opponent_stars));

    let is_league_war = entry
        .war_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("cwl"))
        || entry.attacks_per_member == Some(1);

    let war = WarRecord {
        end_time: key.clone(),
        clan_tag: clan
            .tag
            .as_deref()
            .and_then(|t| normalize_tag(t).ok())
            .unwrap_or_else(|| clan_tag.as_str().to_string()),
        opponent_tag: opponent.tag.as_deref().and_then(|t| normalize_tag(t).ok()),
        opponent_name: opponent
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        team_size: entry.team_size.unwrap_or(members.len() as u32),
        clan_stars,
        opponent_stars,
        clan_destruction: clan.destruction_percentage.unwrap_or(0.0),
        opponent_destruction: opponent.destruction_percentage.unwrap_or(0.0),
        attacks_used: clan.attacks.unwrap_or(listed_attacks),
        result,
        is_league_war,
        violation_count: count_violations(members.iter().map(|m| m.attacks.len() as u32)),
    };

    let mut attacks: Vec<AttackRecord> = members
        .iter()
        .flat_map(|member| {
            let is_violation = member_violations(member.attacks.len() as u32) > 0;
            let attacker_name = member.name.clone().unwrap_or_default();
            let key = &key;
            member.attacks.iter().map(move |attack| AttackRecord {
                war_key: key.clone(),
                attacker_tag: attack.attacker_tag.clone(),
                attacker_name: attacker_name.clone(),
                defender_tag: attack.defender_tag.clone(),
                stars: attack.stars,
                destruction: attack.destruction_percentage,
                order: attack.order,
                is_violation,
            })
        })
        .collect();
    attacks.sort_by_key(|a| a.order);

    Ok(NormalizedWar { war, attacks })
}
