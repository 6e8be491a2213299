//! Sideheat - positional heatmaps for competitive match recordings
//!
//! Turns per-tick player positions into normalized density grids per round
//! and side, then aggregates them by which team played which side.

pub mod analytics;
pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod heatmap;
pub mod maps;
pub mod match_data;
pub mod pipeline;
pub mod sides;
pub mod store;

// Re-export commonly used types for convenience
pub use analytics::{TeamSideAccumulator, TeamSideHeatmap, TeamSideHeatmaps, aggregate};
pub use config::HeatmapConfig;
pub use constants::*;
pub use error::{HeatmapError, Result};
pub use export::{
    CombinedHeatmapDocument, HeatmapFilters, RoundHeatmapDocument, StagedDocument, TeamSideDocument,
    stage_document, write_document,
};
pub use heatmap::{
    DensityGrid, GridOptions, PositionSample, PositionSelector, RoundGrids, RoundSelection,
    SideFilter, SideGrids, TimeWindow, bin, combined_heatmap, extract, round_heatmaps,
};
pub use maps::{MapBounds, MapRegistry, ResolvedMap};
pub use match_data::{
    MatchHeader, MatchRecord, PlayerInfo, RoundInfo, Side, TickRange, TickSample, load_match,
    parse_match,
};
pub use pipeline::{MatchSource, PipelineReport, PipelineSettings};
pub use sides::{RoundSideAssignment, RoundSides, SideResolver, TeamPair};
pub use store::{JsonDirStore, MatchMetadata, MatchStore, StoredMatch, StoredMatchInfo};
