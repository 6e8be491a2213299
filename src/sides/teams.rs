//! Team pair discovery

use serde::{Deserialize, Serialize};

use crate::constants::{FALLBACK_TEAM_A, FALLBACK_TEAM_B};
use crate::error::{HeatmapError, Result};
use crate::match_data::MatchRecord;

/// The two teams whose heatmaps get bucketed by side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPair {
    pub team_a: String,
    pub team_b: String,
}

impl TeamPair {
    /// Explicit pair, e.g. from command line overrides. Names must differ.
    pub fn new(team_a: impl Into<String>, team_b: impl Into<String>) -> Result<Self> {
        let pair = Self {
            team_a: team_a.into(),
            team_b: team_b.into(),
        };
        if pair.team_a.is_empty() || pair.team_b.is_empty() {
            return Err(HeatmapError::InvalidParameter(
                "team names must not be empty".to_string(),
            ));
        }
        if pair.team_a == pair.team_b {
            return Err(HeatmapError::InvalidParameter(format!(
                "both teams are named '{}'",
                pair.team_a
            )));
        }
        Ok(pair)
    }

    /// First two distinct team names in roster order.
    /// Falls back to placeholder names when fewer than two are present.
    pub fn from_match(record: &MatchRecord) -> Self {
        let mut found: Vec<&str> = Vec::with_capacity(2);
        for team in record
            .players
            .iter()
            .filter_map(|p| p.team.as_deref())
            .filter(|t| !t.is_empty())
        {
            if !found.contains(&team) {
                found.push(team);
                if found.len() == 2 {
                    break;
                }
            }
        }

        match found.as_slice() {
            [a, b] => Self {
                team_a: a.to_string(),
                team_b: b.to_string(),
            },
            _ => {
                log::warn!(
                    "Fewer than two teams in roster, using '{}' and '{}'",
                    FALLBACK_TEAM_A,
                    FALLBACK_TEAM_B
                );
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self {
            team_a: FALLBACK_TEAM_A.to_string(),
            team_b: FALLBACK_TEAM_B.to_string(),
        }
    }

    /// Pair from the match, with either name optionally overridden
    pub fn resolve(
        record: &MatchRecord,
        team_a: Option<&str>,
        team_b: Option<&str>,
    ) -> Result<Self> {
        if team_a.is_none() && team_b.is_none() {
            return Ok(Self::from_match(record));
        }
        let discovered = Self::from_match(record);
        Self::new(
            team_a.unwrap_or(&discovered.team_a),
            team_b.unwrap_or(&discovered.team_b),
        )
    }

    pub fn names(&self) -> [&str; 2] {
        [&self.team_a, &self.team_b]
    }
}
