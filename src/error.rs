//! Error types for sideheat

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeatmapError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed match record: {0}")]
    MalformedMatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large ({size_mb:.2}MB). Maximum: {limit_mb}MB")]
    TooLarge { size_mb: f64, limit_mb: u64 },
}

impl HeatmapError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeatmapError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for HeatmapError {
    fn from(e: toml::de::Error) -> Self {
        HeatmapError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
