//! Team+side aggregation
//!
//! Routes each round's CT and T grids to the team that played that side,
//! then finalizes four buckets: both teams as T and as CT.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::error::Result;
use crate::heatmap::RoundGrids;
use crate::match_data::Side;
use crate::sides::{RoundSideAssignment, TeamPair};

use super::accumulator::{TeamSideAccumulator, TeamSideHeatmap};

/// Bucket key, e.g. `Vitality_as_CT`
pub fn bucket_key(team: &str, side: Side) -> String {
    format!("{}_as_{}", team, side.label())
}

/// The four finalized buckets keyed by `bucket_key`
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSideHeatmaps {
    pub teams: TeamPair,
    pub buckets: BTreeMap<String, TeamSideHeatmap>,
    /// Rounds with grids that could not be attributed to both teams
    pub skipped_rounds: Vec<u32>,
}

impl TeamSideHeatmaps {
    pub fn get(&self, team: &str, side: Side) -> Option<&TeamSideHeatmap> {
        self.buckets.get(&bucket_key(team, side))
    }
}

/// Aggregate per-round grids into team+side buckets.
///
/// Rounds where either team's side is unknown, or where both teams were
/// seen on the same side, are skipped with a warning.
pub fn aggregate(
    per_round: &BTreeMap<u32, RoundGrids>,
    assignment: &RoundSideAssignment,
    teams: &TeamPair,
    grid_size: usize,
) -> Result<TeamSideHeatmaps> {
    let mut accumulators: BTreeMap<String, TeamSideAccumulator> = BTreeMap::new();
    for team in teams.names() {
        for side in Side::BOTH {
            accumulators.insert(bucket_key(team, side), TeamSideAccumulator::new(grid_size));
        }
    }

    let mut skipped_rounds = Vec::new();

    for (&round_num, grids) in per_round {
        let side_a = assignment.side_of(round_num, &teams.team_a);
        let side_b = assignment.side_of(round_num, &teams.team_b);

        let (Some(side_a), Some(side_b)) = (side_a, side_b) else {
            warn!(
                "Could not determine team sides for round {}, skipping",
                round_num
            );
            skipped_rounds.push(round_num);
            continue;
        };
        if side_a == side_b {
            warn!(
                "Both teams seen as {} in round {}, skipping",
                side_a, round_num
            );
            skipped_rounds.push(round_num);
            continue;
        }

        for (team, side) in [(&teams.team_a, side_a), (&teams.team_b, side_b)] {
            let grid = grids.for_side(side);
            if let Some(acc) = accumulators.get_mut(&bucket_key(team, side)) {
                acc.add(round_num, grid, grid.sample_count)?;
            }
        }
    }

    let buckets: BTreeMap<String, TeamSideHeatmap> = accumulators
        .into_iter()
        .map(|(key, acc)| (key, acc.finalize()))
        .collect();

    info!(
        "Aggregated {} rounds into {} buckets ({} skipped)",
        per_round.len() - skipped_rounds.len(),
        buckets.len(),
        skipped_rounds.len()
    );

    Ok(TeamSideHeatmaps {
        teams: teams.clone(),
        buckets,
        skipped_rounds,
    })
}
