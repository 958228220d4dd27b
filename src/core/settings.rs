//! Persisted converter settings
//!
//! Persisted to the platform data directory as `settings.json`. The
//! scheduler never reads these: callers load them and pass the resulting
//! policy in at submission time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::policy::{ConversionPolicy, OutputDestination};

fn default_max_concurrent() -> usize {
    3
}

fn default_bitrate() -> u32 {
    192
}

/// Application-wide converter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterSettings {
    /// Delete source files after successful conversion
    #[serde(default)]
    pub delete_original: bool,
    /// Where converted files are written
    #[serde(default)]
    pub destination: OutputDestination,
    /// Maximum number of jobs outstanding at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Target bitrate in kbps
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            delete_original: false,
            destination: OutputDestination::NextToSource,
            max_concurrent: default_max_concurrent(),
            bitrate: default_bitrate(),
        }
    }
}

impl ConverterSettings {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Get the app data directory
    fn get_app_data_dir() -> Result<PathBuf, String> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| "Could not determine data directory".to_string())?;

        let app_dir = data_dir.join("audiobatch");

        if !app_dir.exists() {
            std::fs::create_dir_all(&app_dir)
                .map_err(|e| format!("Failed to create app data directory: {}", e))?;
        }

        Ok(app_dir)
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(settings) => {
                log::debug!("Loaded settings from disk");
                settings
            }
            Err(e) => {
                log::debug!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self, String> {
        let app_dir = Self::get_app_data_dir()?;
        let settings_path = app_dir.join(Self::SETTINGS_FILE);

        if !settings_path.exists() {
            return Err("Settings file not found".to_string());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let app_dir = Self::get_app_data_dir()?;
        let settings_path = app_dir.join(Self::SETTINGS_FILE);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(&settings_path, json)
            .map_err(|e| format!("Failed to write settings: {}", e))?;

        log::debug!("Saved settings to {:?}", settings_path);
        Ok(())
    }

    /// The submission-time policy these settings describe
    pub fn policy(&self) -> ConversionPolicy {
        ConversionPolicy {
            delete_original: self.delete_original,
            destination: self.destination.clone(),
        }
    }
}
