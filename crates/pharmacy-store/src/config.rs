//! # Store Configuration
//!
//! Configuration management for the entity store.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     PHARMACY_API_URL=https://api.pharmacy.example/v1                    │
//! │     PHARMACY_SNAPSHOT_PATH=/var/lib/pharmacy/pharmacy-store.json        │
//! │     PHARMACY_REQUEST_TIMEOUT_SECS=15                                    │
//! │     PHARMACY_PERSIST=false                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/store/store.toml (Linux)                                  │
//! │     ~/Library/Application Support/com.pharmacy.store/store.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     no backend, persistence on, platform data dir snapshot              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # store.toml
//! [api]
//! base_url = "https://api.pharmacy.example/v1"
//! timeout_secs = 30
//!
//! [persistence]
//! enabled = true
//! snapshot_path = "/var/lib/pharmacy/pharmacy-store.json"
//!
//! [events]
//! capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::persistence::STORAGE_KEY;

// =============================================================================
// Settings Sections
// =============================================================================

/// Backend REST settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the REST backend. `None` runs the store local-only.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Write-through snapshots on every mutation.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Snapshot file. Defaults to the platform data dir.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            enabled: true,
            snapshot_path: None,
        }
    }
}

/// Change-event channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Broadcast buffer; slow subscribers past this lag miss events.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            capacity: default_capacity(),
        }
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub events: EventSettings,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (store.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> StoreResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StoreError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Store config saved");
        Ok(())
    }

    pub fn validate(&self) -> StoreResult<()> {
        if let Some(ref url) = self.api.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(StoreError::InvalidConfig(format!(
                    "API URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        if self.api.timeout_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "event capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PHARMACY_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = if url.trim().is_empty() { None } else { Some(url) };
        }

        if let Ok(path) = std::env::var("PHARMACY_SNAPSHOT_PATH") {
            debug!(path = %path, "Overriding snapshot path from environment");
            self.persistence.snapshot_path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("PHARMACY_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.api.timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid request timeout in environment"),
            }
        }

        if let Ok(flag) = std::env::var("PHARMACY_PERSIST") {
            match parse_flag(&flag) {
                Some(enabled) => self.persistence.enabled = enabled,
                None => warn!(value = %flag, "Unknown persistence flag in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pharmacy", "store")
            .map(|dirs| dirs.config_dir().join("store.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn api_url(&self) -> Option<&str> {
        self.api.base_url.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn persistence_enabled(&self) -> bool {
        self.persistence.enabled
    }

    /// Snapshot file: the explicit path, else `<data dir>/pharmacy-store.json`.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.persistence.snapshot_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "pharmacy", "store")
                .map(|dirs| dirs.data_dir().join(format!("{}.json", STORAGE_KEY)))
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.api_url(), None);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.persistence_enabled());
        assert_eq!(config.events.capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StoreConfig::default();

        config.api.base_url = Some("ws://api.example".to_string());
        assert!(config.validate().unwrap_err().is_config_error());

        config.api.base_url = Some("https://api.example/v1".to_string());
        assert!(config.validate().is_ok());

        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.api.timeout_secs = 5;
        config.events.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: StoreConfig = toml::from_str(
            r#"
            [api]
            base_url = "http://localhost:4000"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url(), Some("http://localhost:4000"));
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.persistence.enabled);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.toml");

        let mut config = StoreConfig::default();
        config.persistence.snapshot_path = Some(dir.path().join("snap.json"));
        config.events.capacity = 32;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[persistence]"));

        let loaded: StoreConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_explicit_snapshot_path_wins() {
        let mut config = StoreConfig::default();
        config.persistence.snapshot_path = Some(PathBuf::from("/tmp/rx.json"));
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("/tmp/rx.json")));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
