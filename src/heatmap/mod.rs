//! Position heatmaps
//!
//! Filters tick positions out of a match, bins them into normalized density
//! grids, and builds those grids per round and side.

mod extract;
mod grid;
mod rounds;

pub use extract::{
    PositionSample, PositionSelector, RoundSelection, SideFilter, TimeWindow, extract,
    round_window, selected_ranges,
};
pub use grid::{DensityGrid, bin};
pub use rounds::{GridOptions, RoundGrids, SideGrids, combined_heatmap, round_heatmaps};
