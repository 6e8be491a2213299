//! Per-round and whole-match heatmap generation

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::match_data::{MatchRecord, Side};
use crate::maps::MapBounds;

use super::extract::{PositionSelector, RoundSelection, SideFilter, TimeWindow, extract};
use super::grid::{DensityGrid, bin};

/// CT and T grids for one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundGrids {
    pub ct: DensityGrid,
    pub t: DensityGrid,
}

impl RoundGrids {
    pub fn for_side(&self, side: Side) -> &DensityGrid {
        match side {
            Side::Ct => &self.ct,
            Side::T => &self.t,
        }
    }
}

/// Settings shared by every grid built in one run
#[derive(Debug, Clone, PartialEq)]
pub struct GridOptions {
    pub grid_size: usize,
    pub alive_only: bool,
    pub time_window: Option<TimeWindow>,
}

/// Build CT and T grids for every selected round in the record, keyed by round number.
pub fn round_heatmaps(
    record: &MatchRecord,
    bounds: &MapBounds,
    options: &GridOptions,
    rounds: &RoundSelection,
) -> BTreeMap<u32, RoundGrids> {
    let mut result = BTreeMap::new();

    for round in record.rounds.iter().filter(|r| rounds.includes(r.round_num)) {
        let selector = PositionSelector::default()
            .with_rounds(RoundSelection::only([round.round_num]))
            .with_alive_only(options.alive_only)
            .with_time_window(options.time_window);

        let ct = side_grid(record, bounds, options.grid_size, &selector, Side::Ct);
        let t = side_grid(record, bounds, options.grid_size, &selector, Side::T);

        debug!(
            "Round {}: CT samples {}, T samples {}",
            round.round_num, ct.sample_count, t.sample_count
        );

        result.insert(round.round_num, RoundGrids { ct, t });
    }

    if let RoundSelection::Only(wanted) = rounds {
        for missing in wanted.iter().filter(|r| !result.contains_key(r)) {
            warn!("Round {} requested but not present in match", missing);
        }
    }

    info!("Built heatmaps for {} rounds", result.len());
    result
}

fn side_grid(
    record: &MatchRecord,
    bounds: &MapBounds,
    grid_size: usize,
    selector: &PositionSelector,
    side: Side,
) -> DensityGrid {
    let selector = selector.clone().with_side(SideFilter::Only(side));
    let samples = extract(record, &selector);
    bin(&samples, bounds, grid_size)
}

/// Whole-match grids for the sides named by the selector.
/// Sides the selector excludes are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SideGrids {
    pub ct: Option<DensityGrid>,
    pub t: Option<DensityGrid>,
}

/// Build one grid per requested side across all selected rounds.
pub fn combined_heatmap(
    record: &MatchRecord,
    bounds: &MapBounds,
    selector: &PositionSelector,
    grid_size: usize,
) -> SideGrids {
    let mut grids = SideGrids { ct: None, t: None };

    for side in selector.side.sides() {
        let grid = side_grid(record, bounds, grid_size, selector, side);
        if grid.sample_count == 0 {
            warn!("No positions found for {} side", side);
        } else {
            info!("{} side: {} position samples", side, grid.sample_count);
        }
        match side {
            Side::Ct => grids.ct = Some(grid),
            Side::T => grids.t = Some(grid),
        }
    }

    grids
}
