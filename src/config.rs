//! Pipeline configuration
//!
//! Loaded from a TOML file (`config/sideheat.toml` unless `--config` names
//! another), falling back to defaults. CLI flags override loaded values.
//!
//! ```toml
//! grid_size = 64
//! alive_only = true
//! resolution_window_ticks = 100
//! default_map = "de_ancient"
//!
//! [maps.de_dust2]
//! minX = -2476
//! maxX = 2127
//! minY = -1262
//! maxY = 3239
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::constants::{CONFIG_FILE, DEFAULT_GRID_SIZE, DEFAULT_MAP, RESOLUTION_WINDOW_TICKS};
use crate::error::{HeatmapError, Result};
use crate::maps::{MapBounds, MapRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Bins per axis
    pub grid_size: usize,
    /// Drop samples of dead players
    pub alive_only: bool,
    /// Side-resolution window width in raw ticks
    pub resolution_window_ticks: i64,
    /// Map whose bounds are used for unknown map names
    pub default_map: String,
    /// Extra or overriding map bounds
    pub maps: BTreeMap<String, MapBounds>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            alive_only: true,
            resolution_window_ticks: RESOLUTION_WINDOW_TICKS,
            default_map: DEFAULT_MAP.to_string(),
            maps: BTreeMap::new(),
        }
    }
}

impl HeatmapConfig {
    /// Load from an explicit path; missing or invalid files are errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HeatmapError::io(path, e))?;
        let config = Self::parse(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else the default config file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(HeatmapError::Config("grid_size must be at least 1".to_string()));
        }
        if self.resolution_window_ticks < 0 {
            return Err(HeatmapError::Config(
                "resolution_window_ticks must not be negative".to_string(),
            ));
        }
        for (name, bounds) in &self.maps {
            bounds
                .validate()
                .map_err(|e| HeatmapError::Config(format!("map '{}': {}", name, e)))?;
        }
        Ok(())
    }

    /// Built-in bounds merged with the configured maps
    pub fn map_registry(&self) -> Result<MapRegistry> {
        let mut registry = MapRegistry::builtin();
        for (name, bounds) in &self.maps {
            registry.insert(name, *bounds)?;
        }
        registry.set_default_map(&self.default_map);

        if registry.get(&self.default_map).is_none() {
            return Err(HeatmapError::Config(format!(
                "default_map '{}' has no bounds",
                self.default_map
            )));
        }

        Ok(registry)
    }
}
