//! Tracker configuration.
//!
//! Every field has a default, so a partial JSON document only overrides what
//! it names.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::suggestion::SuggestionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seed the starter quests when a profile has no quest list yet.
    pub seed_default_quests: bool,
    pub suggestions: SuggestionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            seed_default_quests: true,
            suggestions: SuggestionConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Json`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Json` when the document does not parse.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
