//! Pipeline defaults
//!
//! Every value here can be overridden through `HeatmapConfig` or CLI flags.

// =============================================================================
// GRID
// =============================================================================

/// Bins per axis when nothing else is configured
pub const DEFAULT_GRID_SIZE: usize = 50;

// =============================================================================
// MATCH RECORD
// =============================================================================

/// Tick rate assumed when the match header omits it
pub const DEFAULT_TICK_RATE: f64 = 64.0;

/// Map used when the header has no map name or the name is unknown
pub const DEFAULT_MAP: &str = "de_ancient";

// =============================================================================
// SIDE RESOLUTION
// =============================================================================

/// Width of the side-resolution window in raw ticks after active-play start.
/// Fixed regardless of tick rate.
pub const RESOLUTION_WINDOW_TICKS: i64 = 100;

/// Distinct teams needed before a round counts as resolved
pub const TEAMS_PER_ROUND: usize = 2;

/// Team names used when the roster holds fewer than two teams
pub const FALLBACK_TEAM_A: &str = "Team1";
pub const FALLBACK_TEAM_B: &str = "Team2";

// =============================================================================
// FILES
// =============================================================================

/// Config file picked up when `--config` is not given
pub const CONFIG_FILE: &str = "config/sideheat.toml";

/// Default aggregate output file name
pub const TEAM_SIDE_OUTPUT_FILE: &str = "heatmaps_by_team_side.json";

/// Largest match payload the store accepts (MB)
pub const MAX_MATCH_SIZE_MB: u64 = 500;

/// Match store directory when `--store-dir` is not given
pub const DEFAULT_STORE_DIR: &str = "demos";
