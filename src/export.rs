//! Heatmap documents and file output
//!
//! Three documents leave the pipeline: per-round grids, team+side buckets,
//! and the whole-match combined grids. Each echoes the grid size, map bounds
//! and filters it was built with, plus the map name and generation time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analytics::{TeamSideHeatmap, TeamSideHeatmaps};
use crate::error::{HeatmapError, Result};
use crate::heatmap::{
    DensityGrid, GridOptions, PositionSelector, RoundGrids, RoundSelection, SideFilter, SideGrids,
    TimeWindow,
};
use crate::maps::MapBounds;
use crate::sides::TeamPair;

/// Combined document file name for a map
pub fn combined_file_name(map_name: &str) -> String {
    format!("heatmap_{}_combined.json", map_name)
}

/// Per-round document file name for a map
pub fn rounds_file_name(map_name: &str) -> String {
    format!("round_heatmaps_{}.json", map_name)
}

// =============================================================================
// SHARED PIECES
// =============================================================================

/// Filters a document was built with.
/// `side` and `rounds` only appear in combined documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<SideFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<RoundSelection>,
    pub alive_only: bool,
    pub time_window: Option<TimeWindow>,
    pub grid_size: usize,
}

impl HeatmapFilters {
    pub fn per_round(options: &GridOptions) -> Self {
        Self {
            side: None,
            rounds: None,
            alive_only: options.alive_only,
            time_window: options.time_window,
            grid_size: options.grid_size,
        }
    }

    pub fn combined(selector: &PositionSelector, grid_size: usize) -> Self {
        Self {
            side: Some(selector.side),
            rounds: Some(selector.rounds.clone()),
            alive_only: selector.alive_only,
            time_window: selector.time_window,
            grid_size,
        }
    }
}

/// Map name and generation timestamp (RFC 3339, UTC)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    #[serde(default)]
    pub map_name: String,
    #[serde(default)]
    pub generated_at: String,
}

impl Provenance {
    pub fn now(map_name: &str) -> Self {
        Self {
            map_name: map_name.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// One side's grid as exported: `{"grid": [[..]], "samples": n}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideGridJson {
    pub grid: Vec<Vec<f64>>,
    pub samples: usize,
}

impl SideGridJson {
    pub fn empty(grid_size: usize) -> Self {
        Self::from(&DensityGrid::zeros(grid_size))
    }

    /// Rebuild the grid, checking it is `grid_size x grid_size`
    pub fn to_grid(&self, grid_size: usize) -> Result<DensityGrid> {
        DensityGrid::from_rows(&self.grid, grid_size, self.samples)
    }
}

impl From<&DensityGrid> for SideGridJson {
    fn from(grid: &DensityGrid) -> Self {
        Self {
            grid: grid.to_rows(),
            samples: grid.sample_count,
        }
    }
}

// =============================================================================
// PER-ROUND DOCUMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundGridsJson {
    pub ct: SideGridJson,
    pub t: SideGridJson,
}

/// `{"roundHeatmaps": {"<roundNum>": {"ct", "t"}}, "gridSize", "bounds", "filters"}`
///
/// Provenance fields are spelled out rather than flattened: flattening
/// buffers the document and integer round keys no longer parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundHeatmapDocument {
    pub round_heatmaps: BTreeMap<u32, RoundGridsJson>,
    pub grid_size: usize,
    pub bounds: MapBounds,
    pub filters: HeatmapFilters,
    #[serde(default)]
    pub map_name: String,
    #[serde(default)]
    pub generated_at: String,
}

impl RoundHeatmapDocument {
    pub fn new(
        per_round: &BTreeMap<u32, RoundGrids>,
        bounds: &MapBounds,
        options: &GridOptions,
        map_name: &str,
    ) -> Self {
        let round_heatmaps = per_round
            .iter()
            .map(|(round, grids)| {
                (
                    *round,
                    RoundGridsJson {
                        ct: SideGridJson::from(&grids.ct),
                        t: SideGridJson::from(&grids.t),
                    },
                )
            })
            .collect();

        let Provenance {
            map_name,
            generated_at,
        } = Provenance::now(map_name);

        Self {
            round_heatmaps,
            grid_size: options.grid_size,
            bounds: *bounds,
            filters: HeatmapFilters::per_round(options),
            map_name,
            generated_at,
        }
    }

    /// Read a per-round document written by an earlier run
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HeatmapError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Grids per round, each checked against `gridSize`
    pub fn round_grids(&self) -> Result<BTreeMap<u32, RoundGrids>> {
        if self.grid_size == 0 {
            return Err(HeatmapError::MalformedMatch(
                "per-round document has gridSize 0".to_string(),
            ));
        }

        let mut result = BTreeMap::new();
        for (round, grids) in &self.round_heatmaps {
            let shaped = |side: &SideGridJson| {
                side.to_grid(self.grid_size).map_err(|e| {
                    HeatmapError::MalformedMatch(format!("round {}: {}", round, e))
                })
            };
            result.insert(
                *round,
                RoundGrids {
                    ct: shaped(&grids.ct)?,
                    t: shaped(&grids.t)?,
                },
            );
        }
        Ok(result)
    }
}

// =============================================================================
// TEAM+SIDE DOCUMENT
// =============================================================================

/// `{"teamSideHeatmaps": {"<Team>_as_T": {..}, ..}, "teams", "gridSize", "bounds", "filters"}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSideDocument<'a> {
    pub team_side_heatmaps: &'a BTreeMap<String, TeamSideHeatmap>,
    pub teams: &'a TeamPair,
    pub grid_size: usize,
    pub bounds: MapBounds,
    pub filters: &'a HeatmapFilters,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl<'a> TeamSideDocument<'a> {
    pub fn new(
        heatmaps: &'a TeamSideHeatmaps,
        grid_size: usize,
        bounds: &MapBounds,
        filters: &'a HeatmapFilters,
        map_name: &str,
    ) -> Self {
        Self {
            team_side_heatmaps: &heatmaps.buckets,
            teams: &heatmaps.teams,
            grid_size,
            bounds: *bounds,
            filters,
            provenance: Provenance::now(map_name),
        }
    }
}

// =============================================================================
// COMBINED DOCUMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedHeatmapData {
    pub ct: SideGridJson,
    pub t: SideGridJson,
    pub grid_size: usize,
    pub bounds: MapBounds,
    pub filters: HeatmapFilters,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// `{"heatmapData": {"ct", "t", "gridSize", "bounds", "filters"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedHeatmapDocument {
    pub heatmap_data: CombinedHeatmapData,
}

impl CombinedHeatmapDocument {
    /// Sides missing from `grids` are exported as empty grids with 0 samples
    pub fn new(
        grids: &SideGrids,
        bounds: &MapBounds,
        selector: &PositionSelector,
        grid_size: usize,
        map_name: &str,
    ) -> Self {
        let side = |grid: &Option<DensityGrid>| match grid {
            Some(grid) => SideGridJson::from(grid),
            None => SideGridJson::empty(grid_size),
        };

        Self {
            heatmap_data: CombinedHeatmapData {
                ct: side(&grids.ct),
                t: side(&grids.t),
                grid_size,
                bounds: *bounds,
                filters: HeatmapFilters::combined(selector, grid_size),
                provenance: Provenance::now(map_name),
            },
        }
    }
}

// =============================================================================
// WRITING
// =============================================================================

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// A document written to its temporary sibling, waiting to be moved into
/// place. Dropping it without `commit` removes the temporary file.
pub struct StagedDocument {
    path: PathBuf,
    tmp: PathBuf,
    bytes: usize,
    committed: bool,
}

impl StagedDocument {
    /// Final location once committed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the staged file over `path`
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp, &self.path).map_err(|e| HeatmapError::io(&self.path, e))?;
        self.committed = true;
        info!("Wrote {} ({} bytes)", self.path.display(), self.bytes);
        Ok(())
    }
}

impl Drop for StagedDocument {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Serialize a document fully and write it next to `path` without touching
/// `path` itself.
pub fn stage_document<T: Serialize>(path: &Path, document: &T) -> Result<StagedDocument> {
    let json = serde_json::to_string_pretty(document)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| HeatmapError::io(parent, e))?;
    }

    let tmp = temp_sibling(path);
    if let Err(e) = fs::write(&tmp, json.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(HeatmapError::io(&tmp, e));
    }

    Ok(StagedDocument {
        path: path.to_path_buf(),
        tmp,
        bytes: json.len(),
        committed: false,
    })
}

/// Stage a document, then move it into place.
/// A failed write never leaves a partial file at `path`.
pub fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    stage_document(path, document)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregate;
    use crate::match_data::Side;
    use crate::sides::{RoundSideAssignment, RoundSides};
    use serde_json::{Value, json};

    fn bounds() -> MapBounds {
        MapBounds::new(0.0, 10.0, 0.0, 10.0)
    }

    fn options() -> GridOptions {
        GridOptions {
            grid_size: 2,
            alive_only: true,
            time_window: None,
        }
    }

    fn per_round() -> BTreeMap<u32, RoundGrids> {
        let hot = DensityGrid::from_rows(&[vec![1.0, 0.0], vec![0.0, 0.0]], 2, 4).unwrap();
        let mut rounds = BTreeMap::new();
        for r in [2, 10] {
            rounds.insert(
                r,
                RoundGrids {
                    ct: hot.clone(),
                    t: DensityGrid::zeros(2),
                },
            );
        }
        rounds
    }

    #[test]
    fn test_round_document_shape() {
        let doc = RoundHeatmapDocument::new(&per_round(), &bounds(), &options(), "de_mirage");
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["gridSize"], 2);
        assert_eq!(value["bounds"], json!({"minX": 0.0, "maxX": 10.0, "minY": 0.0, "maxY": 10.0}));
        assert_eq!(
            value["filters"],
            json!({"aliveOnly": true, "timeWindow": null, "gridSize": 2})
        );
        assert_eq!(value["roundHeatmaps"]["10"]["ct"]["samples"], 4);
        assert_eq!(value["roundHeatmaps"]["2"]["t"]["grid"], json!([[0.0, 0.0], [0.0, 0.0]]));
        assert_eq!(value["mapName"], "de_mirage");
        assert!(value["generatedAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_round_document_reads_back() {
        let doc = RoundHeatmapDocument::new(&per_round(), &bounds(), &options(), "de_mirage");
        let text = serde_json::to_string(&doc).unwrap();
        let parsed: RoundHeatmapDocument = serde_json::from_str(&text).unwrap();

        let grids = parsed.round_grids().unwrap();
        assert_eq!(grids.keys().copied().collect::<Vec<_>>(), vec![2, 10]);
        assert_eq!(grids[&2].ct.sample_count, 4);
        assert_eq!(grids[&2].ct.get(0, 0), Some(1.0));
    }

    #[test]
    fn test_round_document_without_provenance() {
        let text = r#"{
            "roundHeatmaps": {"1": {"ct": {"grid": [[0.0]], "samples": 0}, "t": {"grid": [[1.0]], "samples": 3}}},
            "gridSize": 1,
            "bounds": {"minX": 0, "maxX": 1, "minY": 0, "maxY": 1},
            "filters": {"aliveOnly": true, "timeWindow": [0, 30], "gridSize": 1}
        }"#;
        let doc: RoundHeatmapDocument = serde_json::from_str(text).unwrap();
        assert!(doc.map_name.is_empty());
        assert!(doc.generated_at.is_empty());
        assert_eq!(doc.filters.time_window, Some(TimeWindow::new(0.0, 30.0).unwrap()));
        assert_eq!(doc.round_grids().unwrap()[&1].t.sample_count, 3);
    }

    #[test]
    fn test_round_document_shape_mismatch() {
        let text = r#"{
            "roundHeatmaps": {"1": {"ct": {"grid": [[0.0, 0.0]], "samples": 0}, "t": {"grid": [[1.0]], "samples": 3}}},
            "gridSize": 1,
            "bounds": {"minX": 0, "maxX": 1, "minY": 0, "maxY": 1},
            "filters": {"aliveOnly": true, "timeWindow": null, "gridSize": 1}
        }"#;
        let doc: RoundHeatmapDocument = serde_json::from_str(text).unwrap();
        assert!(matches!(doc.round_grids(), Err(HeatmapError::MalformedMatch(_))));
    }

    #[test]
    fn test_team_side_document_shape() {
        let teams = TeamPair::new("A", "B").unwrap();
        let mut assignment = RoundSideAssignment::default();
        assignment.insert(2, RoundSides::from([("A", Side::Ct), ("B", Side::T)]));
        let heatmaps = aggregate(&per_round(), &assignment, &teams, 2).unwrap();
        let filters = HeatmapFilters::per_round(&options());

        let doc = TeamSideDocument::new(&heatmaps, 2, &bounds(), &filters, "de_mirage");
        let value = serde_json::to_value(&doc).unwrap();

        let buckets = value["teamSideHeatmaps"].as_object().unwrap();
        assert_eq!(buckets.len(), 4);
        assert_eq!(value["teamSideHeatmaps"]["A_as_CT"]["rounds"], json!([2]));
        assert_eq!(value["teamSideHeatmaps"]["A_as_CT"]["numRounds"], 1);
        assert_eq!(value["teamSideHeatmaps"]["A_as_T"]["numRounds"], 0);
        assert_eq!(value["teams"], json!({"teamA": "A", "teamB": "B"}));
        assert_eq!(value["gridSize"], 2);
    }

    #[test]
    fn test_combined_document_fills_missing_side() {
        let selector = PositionSelector::default().with_side(SideFilter::Only(Side::T));
        let grids = SideGrids {
            ct: None,
            t: Some(DensityGrid::from_rows(&[vec![0.5, 1.0], vec![0.0, 0.0]], 2, 9).unwrap()),
        };

        let doc = CombinedHeatmapDocument::new(&grids, &bounds(), &selector, 2, "de_ancient");
        let value: Value = serde_json::to_value(&doc).unwrap();
        let data = &value["heatmapData"];

        assert_eq!(data["ct"], json!({"grid": [[0.0, 0.0], [0.0, 0.0]], "samples": 0}));
        assert_eq!(data["t"]["samples"], 9);
        assert_eq!(data["filters"]["side"], "T");
        assert_eq!(data["filters"]["rounds"], "all");
        assert_eq!(data["filters"]["aliveOnly"], true);
    }

    #[test]
    fn test_write_document_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("doc.json");

        write_document(&path, &json!({"a": 1})).unwrap();
        write_document(&path, &json!({"a": 2})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"a": 2}));

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_uncommitted_stage_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let staged = stage_document(&path, &json!({"a": 1})).unwrap();
        assert_eq!(staged.path(), path.as_path());
        assert!(!path.exists());
        drop(staged);

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(combined_file_name("de_ancient"), "heatmap_de_ancient_combined.json");
        assert_eq!(rounds_file_name("de_mirage"), "round_heatmaps_de_mirage.json");
    }
}
