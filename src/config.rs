//! Configuration for Focus Fee.

use crate::core::{DEFAULT_FEE_PER_MINUTE, DEFAULT_SELF_MARKERS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default payment endpoint base URL (local dev server).
pub const DEFAULT_PAYMENT_URL: &str = "http://localhost:3000";

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between window polls
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Fee rate in dollars per minute of distraction
    pub fee_per_minute: f64,

    /// Base URL of the payment endpoint
    pub payment_url: String,

    /// Solana address receiving settlements
    pub wallet_address: Option<String>,

    /// Title/owner fragments identifying our own windows
    pub self_markers: Vec<String>,

    /// Path for storing usage statistics
    pub data_path: PathBuf,

    /// Whether the running session is paused (set by `focus-fee pause`)
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focus-fee");

        Self {
            poll_interval: Duration::from_millis(1500),
            fee_per_minute: DEFAULT_FEE_PER_MINUTE,
            payment_url: DEFAULT_PAYMENT_URL.to_string(),
            wallet_address: None,
            self_markers: DEFAULT_SELF_MARKERS.iter().map(|s| s.to_string()).collect(),
            data_path: data_dir,
            paused: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Directory holding the config and settings files.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focus-fee")
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the path to the blacklist settings file.
    pub fn settings_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    /// Path of the persisted usage statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Configured wallet address, ignoring blank values.
    pub fn wallet(&self) -> Option<&str> {
        self.wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.fee_per_minute, 0.25);
        assert_eq!(config.payment_url, DEFAULT_PAYMENT_URL);
        assert!(config.wallet_address.is_none());
        assert!(!config.paused);
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.poll_interval = Duration::from_millis(250);
        config.wallet_address = Some("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string());
        config.paused = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.poll_interval, Duration::from_millis(250));
        assert_eq!(loaded.wallet(), config.wallet());
        assert!(loaded.paused);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fee_per_minute": 1.0}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.fee_per_minute, 1.0);
        assert_eq!(loaded.poll_interval, Duration::from_millis(1500));
    }

    #[test]
    fn test_blank_wallet_is_ignored() {
        let config = Config {
            wallet_address: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.wallet().is_none());
    }

    #[test]
    fn test_corrupt_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }
}
