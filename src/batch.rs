//! Batch processing
//!
//! Runs the full pipeline over many matches on a Rayon pool. Each match is
//! still one sequential pass and writes into its own output directory.

use std::path::{Path, PathBuf};

use log::{error, info};
use rayon::prelude::*;

use crate::error::{HeatmapError, Result};
use crate::maps::MapRegistry;
use crate::pipeline::{MatchSource, PipelineReport, PipelineSettings, run_full};

/// Result of one match in a batch
pub struct BatchItem {
    pub source: MatchSource,
    pub output_dir: PathBuf,
    pub result: Result<PipelineReport>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-match outcomes, in input order
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchItem> {
        self.items.iter().filter(|i| !i.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    // 0 keeps Rayon's default (one thread per core)
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| HeatmapError::InvalidParameter(format!("thread pool: {}", e)))
}

/// Run the full pipeline for every source. Failures are collected per match;
/// one bad input never stops the others.
pub fn run_batch(
    sources: &[MatchSource],
    registry: &MapRegistry,
    settings: &PipelineSettings,
    output_root: &Path,
    team_side_file: &str,
    threads: usize,
) -> Result<BatchReport> {
    settings.validate()?;
    let pool = build_pool(threads)?;
    info!(
        "Processing {} matches on {} threads",
        sources.len(),
        pool.current_num_threads()
    );

    let items = pool.install(|| {
        sources
            .par_iter()
            .map(|source| {
                let output_dir = output_root.join(source.label());
                let result = source.load().and_then(|record| {
                    run_full(&record, registry, settings, &output_dir, team_side_file)
                });
                if let Err(e) = &result {
                    error!("{}: {}", source.label(), e);
                }
                BatchItem {
                    source: source.clone(),
                    output_dir,
                    result,
                }
            })
            .collect::<Vec<_>>()
    });

    Ok(BatchReport { items })
}
