/// Save data and the stores that persist it.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::player_state::PlayerState;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What gets persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveData {
    pub act: u32,
    /// Scene the player was in when the save was taken.
    pub scene: String,
    pub player_state: PlayerState,
}

impl SaveData {
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<SaveData, SaveError> {
        Ok(serde_json::from_str(input)?)
    }
}

/// Where a session persists its save data.
pub trait SaveStore {
    fn save(&mut self, data: &SaveData) -> Result<(), SaveError>;
    fn load(&self) -> Result<Option<SaveData>, SaveError>;
}

/// Keeps the latest save in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    latest: Option<SaveData>,
    writes: usize,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves written so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SaveStore for MemorySaveStore {
    fn save(&mut self, data: &SaveData) -> Result<(), SaveError> {
        self.latest = Some(data.clone());
        self.writes += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<SaveData>, SaveError> {
        Ok(self.latest.clone())
    }
}

/// Writes the save as pretty JSON to a single file.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    path: PathBuf,
}

impl FileSaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveStore for FileSaveStore {
    fn save(&mut self, data: &SaveData) -> Result<(), SaveError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Readers only ever see a complete file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<SaveData>, SaveError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::player_state::Ledger;

    fn sample() -> SaveData {
        let mut player_state = PlayerState::new();
        player_state.set(Ledger::Relationship, "trust", 2);
        player_state.set(Ledger::Inventory, "lantern", 1);
        SaveData {
            act: 2,
            scene: "scene4".to_string(),
            player_state,
        }
    }

    #[test]
    fn memory_store_keeps_latest() {
        let mut store = MemorySaveStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&sample()).unwrap();
        let mut newer = sample();
        newer.scene = "scene5".to_string();
        store.save(&newer).unwrap();
        assert_eq!(store.load().unwrap(), Some(newer));
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSaveStore::new(dir.path().join("saves").join("slot1.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileSaveStore::new(&path);
        assert!(matches!(store.load(), Err(SaveError::Json(_))));
    }

    #[test]
    fn save_data_json_shape() {
        let json = sample().to_json().unwrap();
        assert!(json.contains(r#""relationships":{"trust":2}"#));
        assert_eq!(SaveData::from_json(&json).unwrap(), sample());
    }
}
