//! Persisted user settings (the blacklist).
//!
//! Settings are stored as `{"blacklist": [...]}`. Reading is forgiving: a
//! missing or unreadable file falls back to the built-in blacklist and
//! non-string entries are dropped. Write failures are logged and swallowed.

use crate::config::{Config, ConfigError};
use crate::core::{default_blacklist, normalize_blacklist};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_blacklist", deserialize_with = "lenient_terms")]
    pub blacklist: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blacklist: default_blacklist(),
        }
    }
}

impl Settings {
    pub fn new<I, S>(blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blacklist: normalize_blacklist(blacklist),
        }
    }
}

/// Accept any JSON array, keeping only its string entries.
fn lenient_terms<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(normalize_blacklist(
        values.iter().filter_map(serde_json::Value::as_str),
    ))
}

/// Key-value persistence for settings.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, ConfigError>;
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;

    /// Load settings, falling back to defaults on any failure.
    fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not load settings, using defaults: {e}");
                Settings::default()
            }
        }
    }

    /// Save settings, logging instead of failing.
    fn save_quietly(&self, settings: &Settings) {
        if let Err(e) = self.save(settings) {
            tracing::warn!("Could not save settings: {e}");
        }
    }
}

/// Settings stored in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user default location.
    pub fn default_location() -> Self {
        Self::new(Config::settings_path())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<Option<Settings>>,
}

impl MemoryStore {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let guard = self
            .settings
            .lock()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        *guard = Some(settings.clone());
        Ok(())
    }
}
