//! Density grids and histogram binning

use crate::error::{HeatmapError, Result};
use crate::maps::MapBounds;

use super::extract::PositionSample;

/// Square occupancy grid, row 0 = north edge of the map, values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    size: usize,
    values: Vec<f64>,
    /// Raw samples handed to the binner, including any outside the bounds
    pub sample_count: usize,
}

impl DensityGrid {
    /// All-zero grid with no samples
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
            sample_count: 0,
        }
    }

    /// Rebuild a grid from exported rows; rows must form a `size x size` square
    pub fn from_rows(rows: &[Vec<f64>], size: usize, sample_count: usize) -> Result<Self> {
        if rows.len() != size || rows.iter().any(|r| r.len() != size) {
            return Err(HeatmapError::MalformedMatch(format!(
                "grid is not {}x{} (got {} rows)",
                size,
                size,
                rows.len()
            )));
        }

        Ok(Self {
            size,
            values: rows.iter().flatten().copied().collect(),
            sample_count,
        })
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Cell value, `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.values.get(self.index(row, col)).copied()
    }

    fn add(&mut self, row: usize, col: usize, amount: f64) {
        let idx = self.index(row, col);
        self.values[idx] += amount;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Row-major copy for export
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        if self.size == 0 {
            return Vec::new();
        }
        self.values.chunks(self.size).map(<[f64]>::to_vec).collect()
    }

    /// Divide every cell by the grid maximum. A zero maximum leaves the grid untouched.
    pub fn normalize(&mut self) {
        let max = self.max();
        if max > 0.0 {
            for v in &mut self.values {
                *v /= max;
            }
        }
    }

    /// Elementwise mean of equally sized grids, every grid weighted the same.
    /// Returns None for an empty slice.
    pub(crate) fn mean_of(grids: &[&DensityGrid]) -> Option<DensityGrid> {
        let first = grids.first()?;
        let mut sum = DensityGrid::zeros(first.size);
        for grid in grids {
            for (acc, v) in sum.values.iter_mut().zip(&grid.values) {
                *acc += v;
            }
        }
        let n = grids.len() as f64;
        for v in &mut sum.values {
            *v /= n;
        }
        Some(sum)
    }
}

/// `bins + 1` evenly spaced edges from `min` to `max`, last edge exact.
fn linear_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let step = (max - min) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| min + step * i as f64).collect();
    edges.push(max);
    edges
}

/// Histogram bin for a value: half-open bins, the last one closed on both ends.
/// Values outside the edges (or NaN) fall in no bin.
fn bin_index(value: f64, edges: &[f64]) -> Option<usize> {
    let bins = edges.len().checked_sub(1).filter(|b| *b > 0)?;
    let first = edges[0];
    let last = edges[bins];

    if !(value >= first && value <= last) {
        return None;
    }
    if value == last {
        return Some(bins - 1);
    }

    let upper = edges.partition_point(|e| *e <= value);
    Some((upper - 1).min(bins - 1))
}

/// Bin positions into a normalized `grid_size x grid_size` density grid.
///
/// Counts are gathered per (x bin, y bin), then laid out with rows running
/// from the map's north edge (max Y) down to its south edge, columns from
/// west to east. The result is max-normalized. Zero samples give an
/// all-zero grid.
pub fn bin(samples: &[PositionSample], bounds: &MapBounds, grid_size: usize) -> DensityGrid {
    let mut grid = DensityGrid::zeros(grid_size);
    grid.sample_count = samples.len();

    if grid_size == 0 || samples.is_empty() {
        return grid;
    }

    let x_edges = linear_edges(bounds.min_x, bounds.max_x, grid_size);
    let y_edges = linear_edges(bounds.min_y, bounds.max_y, grid_size);

    for sample in samples {
        let (Some(x_bin), Some(y_bin)) = (bin_index(sample.x, &x_edges), bin_index(sample.y, &y_edges))
        else {
            continue;
        };
        // Transpose to (y, x) and flip so the top row is the north edge
        let row = grid_size - 1 - y_bin;
        grid.add(row, x_bin, 1.0);
    }

    grid.normalize();
    grid
}
