//! Match record structures shared by the loader and every pipeline stage.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::DEFAULT_TICK_RATE;

/// Competitive role a player holds for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Defender
    #[serde(rename = "CT")]
    Ct,
    /// Attacker
    #[serde(rename = "T")]
    T,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Ct, Side::T];

    /// Label used in match records and bucket names ("CT" / "T")
    pub fn label(&self) -> &'static str {
        match self {
            Side::Ct => "CT",
            Side::T => "T",
        }
    }

    /// Lowercase key used in heatmap documents ("ct" / "t")
    pub fn key(&self) -> &'static str {
        match self {
            Side::Ct => "ct",
            Side::T => "t",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Ct => Side::T,
            Side::T => Side::Ct,
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "CT" | "ct" => Some(Side::Ct),
            "T" | "t" => Some(Side::T),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive tick interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRange {
    pub start: i64,
    pub end: i64,
}

impl TickRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, tick: i64) -> bool {
        self.start <= tick && tick <= self.end
    }

    /// Number of ticks spanned (end - start), zero for an empty range
    pub fn width(&self) -> i64 {
        (self.end - self.start).max(0)
    }
}

/// Match header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHeader {
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default)]
    pub tick_rate: Option<f64>,
}

/// Roster entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    #[serde(default, deserialize_with = "lenient_identity")]
    pub steam_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_identity")]
    pub name: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

impl PlayerInfo {
    /// Identity key: steamId when present, otherwise name
    pub fn identity(&self) -> Option<&str> {
        self.steam_id.as_deref().or(self.name.as_deref())
    }
}

/// Round boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub round_num: u32,
    pub start_tick: i64,
    #[serde(default)]
    pub freeze_time_end_tick: Option<i64>,
    pub end_tick: i64,
}

impl RoundInfo {
    /// First tick of active play: freeze-time end if recorded, else round start
    pub fn active_start(&self) -> i64 {
        self.freeze_time_end_tick.unwrap_or(self.start_tick)
    }

    /// Active-play range [active_start, end_tick]
    pub fn active_range(&self) -> TickRange {
        TickRange::new(self.active_start(), self.end_tick)
    }
}

/// One player's state at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSample {
    pub tick: i64,
    #[serde(default, deserialize_with = "lenient_identity")]
    pub steam_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_identity")]
    pub name: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    /// None for anything other than "CT" / "T" (spectators, unassigned)
    #[serde(default, deserialize_with = "lenient_side")]
    pub side: Option<Side>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default = "default_alive")]
    pub is_alive: bool,
}

impl TickSample {
    /// Identity key: steamId when present, otherwise name
    pub fn identity(&self) -> Option<&str> {
        self.steam_id.as_deref().or(self.name.as_deref())
    }

    /// Position, if both coordinates were recorded
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

fn default_alive() -> bool {
    true
}

/// Complete recorded match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub header: MatchHeader,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
    #[serde(default)]
    pub rounds: Vec<RoundInfo>,
    #[serde(default)]
    pub ticks: Vec<TickSample>,
}

impl MatchRecord {
    pub fn map_name(&self) -> Option<&str> {
        self.header.map_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Header tick rate, or the default when missing or non-positive
    pub fn tick_rate(&self) -> f64 {
        self.header
            .tick_rate
            .filter(|r| *r > 0.0)
            .unwrap_or(DEFAULT_TICK_RATE)
    }

    pub fn round(&self, round_num: u32) -> Option<&RoundInfo> {
        self.rounds.iter().find(|r| r.round_num == round_num)
    }

    pub fn round_numbers(&self) -> Vec<u32> {
        self.rounds.iter().map(|r| r.round_num).collect()
    }
}

/// Accepts identity keys as strings or numbers; empty strings and 0 count as absent.
fn lenient_identity<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) if n.as_u64() != Some(0) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_side<'de, D>(deserializer: D) -> Result<Option<Side>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Side::parse(&s),
        _ => None,
    })
}
