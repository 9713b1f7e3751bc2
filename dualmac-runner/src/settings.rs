//! Runner settings

use std::path::{Path, PathBuf};

use dualmac_sim::scenario;
use dualmac_sim::SimConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RunnerError;

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Built-in scenario to run when no scenario file is given
    pub preset: String,
    /// JSON scenario file; takes precedence over `preset`
    pub scenario_file: Option<PathBuf>,
    /// Overrides the scenario's seed
    pub seed: Option<u64>,
    /// Overrides the scenario's duration
    pub duration_us: Option<u64>,
    /// Print the run summary as JSON instead of a table
    pub json_output: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preset: "four_station".to_string(),
            scenario_file: None,
            seed: None,
            duration_us: None,
            json_output: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for dualmac
    /// Uses $XDG_CONFIG_HOME/dualmac on Linux/macOS, falls back to ~/.config/dualmac
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("dualmac"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("dualmac"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .filter(|path| path.exists())
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, RunnerError> {
        debug!("loading settings from {}", path.display());
        read_json(path)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<PathBuf, RunnerError> {
        let path = Self::settings_path().ok_or(RunnerError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), RunnerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| RunnerError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| RunnerError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| RunnerError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the scenario these settings describe
    pub fn scenario(&self) -> Result<SimConfig, RunnerError> {
        let mut config = match &self.scenario_file {
            Some(path) => {
                info!("scenario file {}", path.display());
                read_json(path)?
            }
            None => {
                info!("scenario preset {}", self.preset);
                scenario::preset(&self.preset)
                    .ok_or_else(|| RunnerError::UnknownPreset(self.preset.clone()))?
            }
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(duration_us) = self.duration_us {
            config.duration_us = duration_us;
        }
        Ok(config)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, RunnerError> {
    let text = std::fs::read_to_string(path).map_err(|source| RunnerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| RunnerError::Json {
        path: path.to_path_buf(),
        source,
    })
}
