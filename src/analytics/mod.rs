//! Cross-round aggregation of heatmaps by team and side

mod accumulator;
mod aggregator;

pub use accumulator::{TeamSideAccumulator, TeamSideHeatmap};
pub use aggregator::{TeamSideHeatmaps, aggregate, bucket_key};
