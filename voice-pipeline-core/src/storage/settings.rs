use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::config::EffectConfig;
use crate::models::error::SettingsError;
use crate::traits::settings_store::SettingsStore;

/// The user's audio choices as written to disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSettings {
    pub capture_device_id: Option<String>,
    pub render_device_id: Option<String>,
    pub effects: EffectConfig,
    pub capture_muted: bool,
    pub render_muted: bool,
    /// RFC 3339 timestamp of the last save.
    pub saved_at: Option<String>,
}

/// Settings stored as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn load(&self) -> Result<Option<PersistedSettings>, SettingsError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::Io(format!("failed to read settings: {}", e))),
        };
        let settings = serde_json::from_str(&json)
            .map_err(|e| SettingsError::Format(format!("failed to parse settings: {}", e)))?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SettingsError::Io(format!("failed to create directory: {}", e)))?;
        }
        let mut stamped = settings.clone();
        stamped.saved_at = Some(chrono::Utc::now().to_rfc3339());
        let json = serde_json::to_string_pretty(&stamped)
            .map_err(|e| SettingsError::Format(format!("failed to serialize settings: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| SettingsError::Io(format!("failed to write settings: {}", e)))?;
        Ok(())
    }
}
