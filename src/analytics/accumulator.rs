//! Equal-weight accumulation of per-round grids

use serde::Serialize;

use crate::error::{HeatmapError, Result};
use crate::heatmap::DensityGrid;

/// Finalized team+side bucket
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSideHeatmap {
    /// Mean of the contributing grids, max-normalized
    pub grid: DensityGrid,
    /// Sum of contributing rounds' sample counts
    pub samples: usize,
    /// Contributing round numbers, in the order they were added
    pub rounds: Vec<u32>,
}

impl TeamSideHeatmap {
    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }
}

/// Exported form: `{"grid", "samples", "rounds", "numRounds"}`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamSideHeatmapJson<'a> {
    grid: Vec<Vec<f64>>,
    samples: usize,
    rounds: &'a [u32],
    num_rounds: usize,
}

impl Serialize for TeamSideHeatmap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        TeamSideHeatmapJson {
            grid: self.grid.to_rows(),
            samples: self.samples,
            rounds: &self.rounds,
            num_rounds: self.num_rounds(),
        }
        .serialize(serializer)
    }
}

/// Collects the rounds routed to one team+side bucket.
///
/// Every round weighs the same in the mean regardless of how many samples
/// it had; sample counts are only summed for reporting.
pub struct TeamSideAccumulator<'a> {
    grid_size: usize,
    grids: Vec<&'a DensityGrid>,
    samples: usize,
    rounds: Vec<u32>,
}

impl<'a> TeamSideAccumulator<'a> {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            grids: Vec::new(),
            samples: 0,
            rounds: Vec::new(),
        }
    }

    pub fn add(&mut self, round_num: u32, grid: &'a DensityGrid, sample_count: usize) -> Result<()> {
        if grid.size() != self.grid_size {
            return Err(HeatmapError::MalformedMatch(format!(
                "round {} grid is {}x{}, expected {}x{}",
                round_num,
                grid.size(),
                grid.size(),
                self.grid_size,
                self.grid_size
            )));
        }
        self.grids.push(grid);
        self.samples += sample_count;
        self.rounds.push(round_num);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn finalize(self) -> TeamSideHeatmap {
        let grid = match DensityGrid::mean_of(&self.grids) {
            Some(mut mean) => {
                mean.normalize();
                mean.sample_count = self.samples;
                mean
            }
            None => DensityGrid::zeros(self.grid_size),
        };

        TeamSideHeatmap {
            grid,
            samples: self.samples,
            rounds: self.rounds,
        }
    }
}
