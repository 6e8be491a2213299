//! Flat JSON directory store
//!
//! `<root>/<id>.json` holds the match data as saved; `<root>/<id>.meta.json`
//! holds its `StoredMatchInfo`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde_json::Value;
use uuid::Uuid;

use super::{MatchMetadata, MatchStore, StoredMatch, StoredMatchInfo};
use crate::constants::MAX_MATCH_SIZE_MB;
use crate::error::{HeatmapError, Result};

const META_SUFFIX: &str = ".meta.json";

pub struct JsonDirStore {
    root: PathBuf,
    max_size_mb: u64,
}

impl JsonDirStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| HeatmapError::io(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            max_size_mb: MAX_MATCH_SIZE_MB,
        })
    }

    pub fn with_max_size_mb(mut self, max_size_mb: u64) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, demo_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", demo_id))
    }

    fn meta_path(&self, demo_id: &str) -> PathBuf {
        self.root.join(format!("{}{}", demo_id, META_SUFFIX))
    }

    /// Ids are UUIDs; anything else cannot name a stored match
    fn check_id(demo_id: &str) -> Result<()> {
        Uuid::parse_str(demo_id)
            .map(|_| ())
            .map_err(|_| HeatmapError::NotFound(format!("match {}", demo_id)))
    }

    fn read_info(&self, demo_id: &str) -> Result<StoredMatchInfo> {
        Self::check_id(demo_id)?;
        let path = self.meta_path(demo_id);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => HeatmapError::NotFound(format!("match {}", demo_id)),
            _ => HeatmapError::io(&path, e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl MatchStore for JsonDirStore {
    fn save(&self, metadata: &MatchMetadata, data: &Value) -> Result<String> {
        let json = serde_json::to_string(data)?;
        let file_size = json.len() as u64;
        let size_mb = file_size as f64 / (1024.0 * 1024.0);
        if size_mb > self.max_size_mb as f64 {
            return Err(HeatmapError::TooLarge {
                size_mb,
                limit_mb: self.max_size_mb,
            });
        }

        let demo_id = Uuid::new_v4().to_string();
        let data_path = self.data_path(&demo_id);
        fs::write(&data_path, json.as_bytes()).map_err(|e| HeatmapError::io(&data_path, e))?;

        let info = StoredMatchInfo {
            demo_id: demo_id.clone(),
            metadata: metadata.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            file_size,
        };
        let meta_path = self.meta_path(&demo_id);
        let written = serde_json::to_string_pretty(&info)
            .map_err(HeatmapError::from)
            .and_then(|meta| {
                fs::write(&meta_path, meta).map_err(|e| HeatmapError::io(&meta_path, e))
            });

        if let Err(e) = written {
            // A data file without metadata would never be listed
            if let Err(rm) = fs::remove_file(&data_path) {
                warn!("Failed to remove {}: {}", data_path.display(), rm);
            }
            return Err(e);
        }

        info!("Stored match {} ({} bytes)", demo_id, file_size);
        Ok(demo_id)
    }

    fn get(&self, demo_id: &str) -> Result<StoredMatch> {
        let info = self.read_info(demo_id)?;

        let path = self.data_path(demo_id);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                HeatmapError::NotFound(format!("data file for match {}", demo_id))
            }
            _ => HeatmapError::io(&path, e),
        })?;

        Ok(StoredMatch {
            demo_id: info.demo_id,
            metadata: info.metadata,
            data: serde_json::from_str(&content)?,
        })
    }

    fn list(&self) -> Result<Vec<StoredMatchInfo>> {
        let entries = fs::read_dir(&self.root).map_err(|e| HeatmapError::io(&self.root, e))?;

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| HeatmapError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(demo_id) = name.strip_suffix(META_SUFFIX) else {
                continue;
            };

            match self.read_info(demo_id) {
                Ok(info) => matches.push(info),
                Err(e) => warn!("Skipping {}: {}", name, e),
            }
        }

        // RFC 3339 UTC timestamps with fixed precision sort as text
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    fn delete(&self, demo_id: &str) -> Result<()> {
        self.read_info(demo_id)?;

        let meta_path = self.meta_path(demo_id);
        fs::remove_file(&meta_path).map_err(|e| HeatmapError::io(&meta_path, e))?;

        let data_path = self.data_path(demo_id);
        match fs::remove_file(&data_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Data file for match {} was already gone", demo_id);
            }
            Err(e) => return Err(HeatmapError::io(&data_path, e)),
        }

        info!("Deleted match {}", demo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::match_from_value;
    use serde_json::json;

    fn metadata(map: &str) -> MatchMetadata {
        MatchMetadata {
            map_name: map.to_string(),
            date: "2024-05-01".to_string(),
            ..Default::default()
        }
    }

    fn data() -> Value {
        json!({
            "header": {"mapName": "de_ancient"},
            "players": [],
            "rounds": [{"roundNum": 1, "startTick": 0, "endTick": 100}],
            "ticks": []
        })
    }

    #[test]
    fn test_save_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();

        let id = store.save(&metadata("de_ancient"), &data()).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(dir.path().join(format!("{}.json", id)).exists());
        assert!(dir.path().join(format!("{}.meta.json", id)).exists());

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.demo_id, id);
        assert_eq!(stored.metadata, metadata("de_ancient"));
        assert_eq!(stored.data, data());
    }

    #[test]
    fn test_envelope_loads_as_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        let id = store.save(&metadata("de_ancient"), &data()).unwrap();

        let envelope = serde_json::to_value(store.get(&id).unwrap()).unwrap();
        let record = match_from_value(envelope).unwrap();
        assert_eq!(record.rounds.len(), 1);
        assert_eq!(record.map_name(), Some("de_ancient"));
    }

    #[test]
    fn test_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();

        let first = store.save(&metadata("de_ancient"), &data()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.save(&metadata("de_mirage"), &data()).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].demo_id, second);
        assert_eq!(listed[1].demo_id, first);
        assert_eq!(listed[0].metadata.map_name, "de_mirage");
        assert!(listed[0].file_size > 0);
    }

    #[test]
    fn test_list_skips_unreadable_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        store.save(&metadata("de_ancient"), &data()).unwrap();

        fs::write(
            dir.path().join(format!("{}.meta.json", Uuid::new_v4())),
            "not json",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_id_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        let unknown = Uuid::new_v4().to_string();

        assert!(matches!(store.get(&unknown), Err(HeatmapError::NotFound(_))));
        assert!(matches!(store.delete(&unknown), Err(HeatmapError::NotFound(_))));
        assert!(matches!(store.get("../escape"), Err(HeatmapError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap();
        let id = store.save(&metadata("de_ancient"), &data()).unwrap();

        store.delete(&id).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(!dir.path().join(format!("{}.json", id)).exists());
        assert!(!dir.path().join(format!("{}.meta.json", id)).exists());
        assert!(matches!(store.get(&id), Err(HeatmapError::NotFound(_))));
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).unwrap().with_max_size_mb(0);

        let err = store.save(&metadata("de_ancient"), &data()).unwrap_err();
        assert!(matches!(err, HeatmapError::TooLarge { limit_mb: 0, .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
