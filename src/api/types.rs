//! Payload shapes returned by the game-data API
//!
//! Every field the upstream may omit is optional or defaulted here; the
//! normalizer decides what an absent value means.

use serde::Deserialize;

/// Envelope of the war log endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarLogResponse {
    #[serde(default)]
    pub items: Vec<WarLogEntry>,
}

/// One finished war from a clan's war log
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarLogEntry {
    /// `win`, `lose` or `tie`; absent for league wars
    pub result: Option<String>,
    /// End timestamp in the API's compact format (`20240101T000000.000Z`)
    pub end_time: Option<String>,
    pub team_size: Option<u32>,
    pub attacks_per_member: Option<u32>,
    /// `regular`, `friendly` or `cwl` when the API reports it
    pub war_type: Option<String>,
    #[serde(default)]
    pub clan: WarSide,
    #[serde(default)]
    pub opponent: WarSide,
}

impl WarLogEntry {
    /// Returns true if the entry describes a war that has ended
    pub fn is_terminal(&self) -> bool {
        self.end_time.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Returns every clan tag this entry references
    pub fn referenced_tags(&self) -> Vec<&str> {
        [self.clan.tag.as_deref(), self.opponent.tag.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// One side of a war
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarSide {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub clan_level: Option<u32>,
    pub attacks: Option<u32>,
    pub stars: Option<u32>,
    pub destruction_percentage: Option<f64>,
    #[serde(default)]
    pub members: Vec<WarMember>,
}

/// A war participant (only present on the current-war endpoint)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarMember {
    pub tag: String,
    pub name: Option<String>,
    pub map_position: Option<u32>,
    #[serde(default)]
    pub attacks: Vec<WarAttack>,
}

/// A single attack made during a war
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarAttack {
    pub attacker_tag: String,
    pub defender_tag: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub destruction_percentage: f64,
    #[serde(default)]
    pub order: u32,
}

/// Phase of the current war
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarState {
    NotInWar,
    Preparation,
    InWar,
    WarEnded,
    #[serde(other)]
    Unknown,
}

/// Payload of the current-war endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWar {
    pub state: WarState,
    pub team_size: Option<u32>,
    pub attacks_per_member: Option<u32>,
    pub war_type: Option<String>,
    pub preparation_start_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub clan: WarSide,
    #[serde(default)]
    pub opponent: WarSide,
}

impl CurrentWar {
    /// Views the current war as a war log entry for normalization
    ///
    /// The current-war endpoint carries no result field, so the normalizer
    /// derives it from stars.
    pub fn to_log_entry(&self) -> WarLogEntry {
        WarLogEntry {
            result: None,
            end_time: self.end_time.clone(),
            team_size: self.team_size,
            attacks_per_member: self.attacks_per_member,
            war_type: self.war_type.clone(),
            clan: self.clan.clone(),
            opponent: self.opponent.clone(),
        }
    }
}
