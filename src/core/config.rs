/// Player configuration passed to a session at construction.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Character-by-character text reveal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub enabled: bool,
    pub ms_per_char: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ms_per_char: 30,
        }
    }
}

/// Debounced autosave settings. A zero delay saves right after each
/// choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Act number shown in the end-of-act marker.
    pub act: u32,
    /// Scene to start from; the first scene of the document when unset.
    pub entry_scene: Option<String>,
    pub reveal: RevealConfig,
    pub autosave: AutosaveConfig,
    /// Whether the presentation layer should translate displayed text.
    /// The engine only carries the flag.
    pub auto_translate: bool,
    pub language: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            act: 1,
            entry_scene: None,
            reveal: RevealConfig::default(),
            autosave: AutosaveConfig::default(),
            auto_translate: false,
            language: None,
        }
    }
}

impl PlayerConfig {
    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<PlayerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PlayerConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn from_json(input: &str) -> Result<PlayerConfig, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Reveal speed in effect; zero when reveal is disabled.
    pub fn effective_ms_per_char(&self) -> u64 {
        if self.reveal.enabled {
            self.reveal.ms_per_char
        } else {
            0
        }
    }
}
