//! Map bounds registry
//!
//! Planar bounds per map identifier, used to scale world coordinates into
//! grid cells. The registry is a plain value handed to the pipeline so tests
//! can supply synthetic bounds.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAP;
use crate::error::{HeatmapError, Result};

/// World-space rectangle covered by a map's radar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl MapBounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(HeatmapError::Config(format!(
                "invalid bounds: x [{}, {}], y [{}, {}]",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Bounds picked for a match, with the name actually used
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMap {
    pub name: String,
    pub bounds: MapBounds,
    /// True when the requested map was unknown and the default was used
    pub fallback: bool,
}

/// Mapping from map identifier to bounds
#[derive(Debug, Clone)]
pub struct MapRegistry {
    maps: BTreeMap<String, MapBounds>,
    default_map: String,
}

impl Default for MapRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MapRegistry {
    /// Empty registry; `default_map` must be inserted before resolving
    pub fn new(default_map: &str) -> Self {
        Self {
            maps: BTreeMap::new(),
            default_map: default_map.to_string(),
        }
    }

    /// Registry with the radar bounds of the supported competitive maps
    pub fn builtin() -> Self {
        Self::new(DEFAULT_MAP)
            .with_map("de_ancient", MapBounds::new(-2953.0, 2119.0, -2887.0, 1983.0))
            .with_map("de_mirage", MapBounds::new(-3230.0, 1890.0, -3407.0, 1682.0))
    }

    pub fn with_map(mut self, name: &str, bounds: MapBounds) -> Self {
        self.maps.insert(name.to_string(), bounds);
        self
    }

    /// Add or replace a map after validating its bounds
    pub fn insert(&mut self, name: &str, bounds: MapBounds) -> Result<()> {
        bounds.validate()?;
        self.maps.insert(name.to_string(), bounds);
        Ok(())
    }

    pub fn set_default_map(&mut self, name: &str) {
        self.default_map = name.to_string();
    }

    pub fn default_map(&self) -> &str {
        &self.default_map
    }

    pub fn get(&self, name: &str) -> Option<&MapBounds> {
        self.maps.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    /// Look up a map, falling back to the default map when unknown or absent
    pub fn resolve(&self, map_name: Option<&str>) -> Result<ResolvedMap> {
        if let Some(name) = map_name
            && let Some(bounds) = self.maps.get(name)
        {
            return Ok(ResolvedMap {
                name: name.to_string(),
                bounds: *bounds,
                fallback: false,
            });
        }

        let bounds = self.maps.get(&self.default_map).ok_or_else(|| {
            HeatmapError::Config(format!(
                "default map '{}' has no bounds configured",
                self.default_map
            ))
        })?;

        if let Some(name) = map_name {
            warn!(
                "Unknown map '{}', using bounds of '{}'",
                name, self.default_map
            );
        }

        Ok(ResolvedMap {
            name: map_name.unwrap_or(&self.default_map).to_string(),
            bounds: *bounds,
            fallback: true,
        })
    }
}
