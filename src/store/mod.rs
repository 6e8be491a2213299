//! Match store
//!
//! Saved matches are addressed by an opaque id. Stages can read a match
//! from the store instead of a file path.

mod json_dir;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::match_data::{MatchRecord, Side};
use crate::sides;

pub use json_dir::JsonDirStore;

/// Descriptive fields saved alongside a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub map_name: String,
    /// Match date, ISO 8601
    pub date: String,
    #[serde(default)]
    pub team_ct: Option<String>,
    #[serde(default)]
    pub team_t: Option<String>,
    #[serde(default)]
    pub player_count: Option<u32>,
    #[serde(default)]
    pub round_count: Option<u32>,
    #[serde(default)]
    pub score_ct: Option<u32>,
    #[serde(default)]
    pub score_t: Option<u32>,
    /// Uploaded file name
    #[serde(default)]
    pub demo_name: Option<String>,
}

impl MatchMetadata {
    /// Derive metadata from a loaded match. Teams per side come from the
    /// first round whose sides resolve; scores are left empty.
    pub fn from_record(record: &MatchRecord, demo_name: Option<&str>) -> Self {
        let assignment = sides::resolve(record);
        let first_resolved = assignment.iter().find(|(_, s)| s.is_resolved());
        let team_on = |side: Side| {
            first_resolved.and_then(|(_, sides)| {
                sides
                    .iter()
                    .find(|(_, s)| *s == side)
                    .map(|(team, _)| team.to_string())
            })
        };

        Self {
            map_name: record.map_name().unwrap_or("unknown").to_string(),
            date: Utc::now().format("%Y-%m-%d").to_string(),
            team_ct: team_on(Side::Ct),
            team_t: team_on(Side::T),
            player_count: Some(record.players.len() as u32),
            round_count: Some(record.rounds.len() as u32),
            score_ct: None,
            score_t: None,
            demo_name: demo_name.map(str::to_string),
        }
    }
}

/// Listing entry for a stored match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatchInfo {
    pub demo_id: String,
    pub metadata: MatchMetadata,
    /// RFC 3339, UTC
    pub created_at: String,
    /// Serialized data size in bytes
    pub file_size: u64,
}

/// A stored match as returned by `get`: `{demo_id, metadata, data}`.
/// The match loader accepts this envelope as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatch {
    pub demo_id: String,
    pub metadata: MatchMetadata,
    pub data: Value,
}

/// Key-value store of match documents plus metadata
pub trait MatchStore {
    /// Persist a match and return its new id
    fn save(&self, metadata: &MatchMetadata, data: &Value) -> Result<String>;

    fn get(&self, demo_id: &str) -> Result<StoredMatch>;

    /// All stored matches, newest first
    fn list(&self) -> Result<Vec<StoredMatchInfo>>;

    fn delete(&self, demo_id: &str) -> Result<()>;
}
