//! Pipeline stages
//!
//! Stages take an already loaded match, compute their documents in memory,
//! and write them last. A failure before the write step leaves no output.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::analytics::{TeamSideHeatmaps, aggregate};
use crate::config::HeatmapConfig;
use crate::error::{HeatmapError, Result};
use crate::export::{
    CombinedHeatmapDocument, RoundHeatmapDocument, TeamSideDocument, combined_file_name,
    rounds_file_name, stage_document, write_document,
};
use crate::heatmap::{
    GridOptions, PositionSelector, RoundGrids, RoundSelection, SideGrids, combined_heatmap,
    round_heatmaps,
};
use crate::maps::{MapRegistry, ResolvedMap};
use crate::match_data::{MatchRecord, load_match, match_from_value};
use crate::sides::{TeamPair, resolve_with_window};
use crate::store::{JsonDirStore, MatchStore};

/// Where a stage reads its match from
#[derive(Debug, Clone, PartialEq)]
pub enum MatchSource {
    File(PathBuf),
    Stored { store_dir: PathBuf, demo_id: String },
}

impl MatchSource {
    pub fn load(&self) -> Result<MatchRecord> {
        match self {
            MatchSource::File(path) => load_match(path),
            MatchSource::Stored { store_dir, demo_id } => {
                let store = JsonDirStore::open(store_dir)?;
                let stored = store.get(demo_id)?;
                info!("Loaded stored match {} ({})", demo_id, stored.metadata.map_name);
                match_from_value(stored.data)
            }
        }
    }

    /// Short name used for output directories in batch runs
    pub fn label(&self) -> String {
        match self {
            MatchSource::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "match".to_string()),
            MatchSource::Stored { demo_id, .. } => demo_id.clone(),
        }
    }
}

/// Settings shared by the per-round and aggregation stages
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub grid: GridOptions,
    pub rounds: RoundSelection,
    pub resolution_window_ticks: i64,
    pub team_a: Option<String>,
    pub team_b: Option<String>,
}

impl PipelineSettings {
    pub fn from_config(config: &HeatmapConfig) -> Self {
        Self {
            grid: GridOptions {
                grid_size: config.grid_size,
                alive_only: config.alive_only,
                time_window: None,
            },
            rounds: RoundSelection::All,
            resolution_window_ticks: config.resolution_window_ticks,
            team_a: None,
            team_b: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_grid_size(self.grid.grid_size)?;
        if self.resolution_window_ticks < 0 {
            return Err(HeatmapError::InvalidParameter(
                "resolution window must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn teams(&self, record: &MatchRecord) -> Result<TeamPair> {
        TeamPair::resolve(record, self.team_a.as_deref(), self.team_b.as_deref())
    }
}

pub fn validate_grid_size(grid_size: usize) -> Result<()> {
    if grid_size == 0 {
        return Err(HeatmapError::InvalidParameter(
            "grid size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// COMPUTE
// =============================================================================

/// Per-round grids for a match, plus the map they were scaled to
pub struct RoundStage {
    pub map: ResolvedMap,
    pub grids: BTreeMap<u32, RoundGrids>,
    pub document: RoundHeatmapDocument,
}

pub fn compute_rounds(
    record: &MatchRecord,
    registry: &MapRegistry,
    settings: &PipelineSettings,
) -> Result<RoundStage> {
    settings.validate()?;
    let map = registry.resolve(record.map_name())?;

    let grids = round_heatmaps(record, &map.bounds, &settings.grid, &settings.rounds);
    let document = RoundHeatmapDocument::new(&grids, &map.bounds, &settings.grid, &map.name);

    Ok(RoundStage {
        map,
        grids,
        document,
    })
}

/// Aggregate per-round grids by team and side
pub fn compute_team_sides(
    record: &MatchRecord,
    grids: &BTreeMap<u32, RoundGrids>,
    grid_size: usize,
    settings: &PipelineSettings,
) -> Result<TeamSideHeatmaps> {
    let teams = settings.teams(record)?;
    info!("Teams: {} vs {}", teams.team_a, teams.team_b);

    let assignment = resolve_with_window(record, settings.resolution_window_ticks);
    let unresolved: Vec<u32> = assignment
        .unresolved_rounds()
        .into_iter()
        .filter(|r| grids.contains_key(r))
        .collect();
    if !unresolved.is_empty() {
        warn!("Sides unresolved for rounds {:?}", unresolved);
    }

    aggregate(grids, &assignment, &teams, grid_size)
}

pub fn compute_combined(
    record: &MatchRecord,
    registry: &MapRegistry,
    selector: &PositionSelector,
    grid_size: usize,
) -> Result<(ResolvedMap, SideGrids, CombinedHeatmapDocument)> {
    validate_grid_size(grid_size)?;
    let map = registry.resolve(record.map_name())?;
    let grids = combined_heatmap(record, &map.bounds, selector, grid_size);
    let document = CombinedHeatmapDocument::new(&grids, &map.bounds, selector, grid_size, &map.name);
    Ok((map, grids, document))
}

// =============================================================================
// STAGES
// =============================================================================

/// `rounds` stage: writes `round_heatmaps_<map>.json` into `output_dir`
pub fn run_rounds(
    record: &MatchRecord,
    registry: &MapRegistry,
    settings: &PipelineSettings,
    output_dir: &Path,
) -> Result<(RoundStage, PathBuf)> {
    let stage = compute_rounds(record, registry, settings)?;
    let path = output_dir.join(rounds_file_name(&stage.map.name));
    write_document(&path, &stage.document)?;
    Ok((stage, path))
}

/// `aggregate` stage: reads a per-round document and writes the team+side
/// document to `output`. Bounds, grid size and filters come from the
/// per-round document.
pub fn run_aggregate(
    record: &MatchRecord,
    round_document: &RoundHeatmapDocument,
    settings: &PipelineSettings,
    output: &Path,
) -> Result<TeamSideHeatmaps> {
    let grids = round_document.round_grids()?;
    let heatmaps = compute_team_sides(record, &grids, round_document.grid_size, settings)?;

    let map_name = if round_document.map_name.is_empty() {
        record.map_name().unwrap_or_default().to_string()
    } else {
        round_document.map_name.clone()
    };
    let document = TeamSideDocument::new(
        &heatmaps,
        round_document.grid_size,
        &round_document.bounds,
        &round_document.filters,
        &map_name,
    );
    write_document(output, &document)?;
    Ok(heatmaps)
}

/// `combined` stage: writes `heatmap_<map>_combined.json` into `output_dir`
pub fn run_combined(
    record: &MatchRecord,
    registry: &MapRegistry,
    selector: &PositionSelector,
    grid_size: usize,
    output_dir: &Path,
) -> Result<(SideGrids, PathBuf)> {
    let (map, grids, document) = compute_combined(record, registry, selector, grid_size)?;
    let path = output_dir.join(combined_file_name(&map.name));
    write_document(&path, &document)?;
    Ok((grids, path))
}

/// Outcome of a full pipeline run
pub struct PipelineReport {
    pub map: ResolvedMap,
    pub rounds_path: PathBuf,
    pub team_side_path: PathBuf,
    pub round_count: usize,
    pub heatmaps: TeamSideHeatmaps,
}

/// `pipeline` stage: per-round grids and team+side aggregation in one pass.
/// Both documents are computed and staged before either is moved into place.
pub fn run_full(
    record: &MatchRecord,
    registry: &MapRegistry,
    settings: &PipelineSettings,
    output_dir: &Path,
    team_side_file: &str,
) -> Result<PipelineReport> {
    let stage = compute_rounds(record, registry, settings)?;
    let heatmaps = compute_team_sides(record, &stage.grids, settings.grid.grid_size, settings)?;
    let filters = stage.document.filters.clone();
    let team_side_document = TeamSideDocument::new(
        &heatmaps,
        settings.grid.grid_size,
        &stage.map.bounds,
        &filters,
        &stage.map.name,
    );

    let rounds_path = output_dir.join(rounds_file_name(&stage.map.name));
    let team_side_path = output_dir.join(team_side_file);
    let staged_rounds = stage_document(&rounds_path, &stage.document)?;
    let staged_team_side = stage_document(&team_side_path, &team_side_document)?;
    staged_rounds.commit()?;
    if let Err(e) = staged_team_side.commit() {
        if let Err(rm) = fs::remove_file(&rounds_path) {
            warn!("Failed to remove {}: {}", rounds_path.display(), rm);
        }
        return Err(e);
    }

    Ok(PipelineReport {
        round_count: stage.grids.len(),
        map: stage.map,
        rounds_path,
        team_side_path,
        heatmaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::{Side, parse_match};
    use crate::maps::MapBounds;

    const MATCH_JSON: &str = r#"{
        "header": {"mapName": "de_test", "tickRate": 64},
        "players": [
            {"steamId": "a", "team": "Alpha"},
            {"steamId": "b", "team": "Bravo"}
        ],
        "rounds": [
            {"roundNum": 1, "startTick": 0, "freezeTimeEndTick": 10, "endTick": 100},
            {"roundNum": 2, "startTick": 200, "freezeTimeEndTick": 210, "endTick": 300}
        ],
        "ticks": [
            {"tick": 11, "steamId": "a", "side": "T", "x": 1, "y": 1},
            {"tick": 11, "steamId": "b", "side": "CT", "x": 9, "y": 9},
            {"tick": 211, "steamId": "a", "side": "CT", "x": 1, "y": 9},
            {"tick": 211, "steamId": "b", "side": "T", "x": 9, "y": 1}
        ]
    }"#;

    fn registry() -> MapRegistry {
        MapRegistry::new("de_test").with_map("de_test", MapBounds::new(0.0, 10.0, 0.0, 10.0))
    }

    fn settings() -> PipelineSettings {
        let mut settings = PipelineSettings::from_config(&HeatmapConfig::default());
        settings.grid.grid_size = 2;
        settings
    }

    #[test]
    fn test_full_pipeline_writes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();

        let report =
            run_full(&record, &registry(), &settings(), dir.path(), "team_side.json").unwrap();

        assert!(report.rounds_path.ends_with("round_heatmaps_de_test.json"));
        assert!(report.rounds_path.exists());
        assert!(report.team_side_path.exists());
        assert_eq!(report.round_count, 2);

        let alpha_t = report.heatmaps.get("Alpha", Side::T).unwrap();
        assert_eq!(alpha_t.rounds, vec![1]);
        // Alpha was T at (1, 1): bottom-left cell
        assert_eq!(alpha_t.grid.get(1, 0), Some(1.0));

        let alpha_ct = report.heatmaps.get("Alpha", Side::Ct).unwrap();
        assert_eq!(alpha_ct.rounds, vec![2]);
        assert_eq!(alpha_ct.grid.get(0, 0), Some(1.0));
    }

    #[test]
    fn test_aggregate_from_round_document() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();
        let (stage, _) = run_rounds(&record, &registry(), &settings(), dir.path()).unwrap();

        let output = dir.path().join("agg.json");
        let heatmaps = run_aggregate(&record, &stage.document, &settings(), &output).unwrap();
        assert_eq!(heatmaps.buckets.len(), 4);
        assert!(heatmaps.skipped_rounds.is_empty());
        assert!(output.exists());
    }

    #[test]
    fn test_zero_grid_size_rejected_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();
        let mut settings = settings();
        settings.grid.grid_size = 0;

        let err = run_full(&record, &registry(), &settings, dir.path(), "t.json");
        assert!(matches!(err, Err(HeatmapError::InvalidParameter(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_second_document_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();
        // A directory where the staging file would go makes the second write fail
        std::fs::create_dir(dir.path().join(".t.json.tmp")).unwrap();

        let result = run_full(&record, &registry(), &settings(), dir.path(), "t.json");
        assert!(matches!(result, Err(HeatmapError::Io { .. })));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".t.json.tmp".to_string()]);
    }

    #[test]
    fn test_team_override_must_differ() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();
        let mut settings = settings();
        settings.team_a = Some("Bravo".to_string());

        assert!(run_full(&record, &registry(), &settings, dir.path(), "t.json").is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_combined_stage_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let record = parse_match(MATCH_JSON).unwrap();
        let (grids, path) =
            run_combined(&record, &registry(), &PositionSelector::default(), 2, dir.path())
                .unwrap();

        assert!(path.ends_with("heatmap_de_test_combined.json"));
        assert_eq!(grids.ct.unwrap().sample_count, 2);
        assert_eq!(grids.t.unwrap().sample_count, 2);
    }

    #[test]
    fn test_source_label() {
        assert_eq!(MatchSource::File(PathBuf::from("/data/final.json")).label(), "final");
        let stored = MatchSource::Stored {
            store_dir: PathBuf::from("store"),
            demo_id: "abc".to_string(),
        };
        assert_eq!(stored.label(), "abc");
    }
}
