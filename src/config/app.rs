//! Process configuration loaded from `config.json`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::{paths, timing};

/// Lower bound for every loop interval, keeps a bad config from spinning
const MIN_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Used when `LOG_LEVEL` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Shared store directory; platform data dir when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,

    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,

    #[serde(default = "default_status_ms")]
    pub status_ms: u64,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_tick_interval_ms() -> u64 {
    timing::TICK_INTERVAL_MS
}

fn default_watch_interval_ms() -> u64 {
    timing::WATCH_INTERVAL_MS
}

fn default_pulse_ms() -> u64 {
    timing::OVERTIME_PULSE_MS
}

fn default_status_ms() -> u64 {
    timing::STATUS_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store_dir: None,
            tick_interval_ms: default_tick_interval_ms(),
            watch_interval_ms: default_watch_interval_ms(),
            pulse_ms: default_pulse_ms(),
            status_ms: default_status_ms(),
        }
    }
}

/// Loop timings handed to the surface controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub tick_interval_ms: u64,
    pub pulse_ms: u64,
    pub status_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        AppConfig::default().timings()
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::CONFIG_FILENAME);
        path
    }

    fn default_store_dir() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::STORE_DIRNAME);
        path
    }

    /// Load from `path`. A missing file is created with defaults; a file
    /// that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, writing defaults");
            let config = Self::default();
            if let Err(e) = config.save(path) {
                // Running with defaults is fine even if they can't be persisted
                warn!(path = %path.display(), error = %e, "Failed to write default config");
            }
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate_and_clamp();
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Configured store directory, or the platform default
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(Self::default_store_dir)
    }

    pub fn timings(&self) -> Timings {
        Timings {
            tick_interval_ms: self.tick_interval_ms,
            pulse_ms: self.pulse_ms,
            status_ms: self.status_ms,
        }
    }

    fn validate_and_clamp(&mut self) {
        for (name, value) in [
            ("tick_interval_ms", &mut self.tick_interval_ms),
            ("watch_interval_ms", &mut self.watch_interval_ms),
        ] {
            if *value < MIN_INTERVAL_MS {
                warn!(field = name, value = *value, min = MIN_INTERVAL_MS, "Interval too small, clamping");
                *value = MIN_INTERVAL_MS;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_written_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "log_level": "debug", "store_dir": "/tmp/cd-store" }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/cd-store"));
        assert_eq!(config.tick_interval_ms, timing::TICK_INTERVAL_MS);
        assert_eq!(config.timings().pulse_ms, timing::OVERTIME_PULSE_MS);
    }

    #[test]
    fn test_malformed_file_is_error_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.json"));
    }

    #[test]
    fn test_intervals_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "tick_interval_ms": 0, "watch_interval_ms": 3 }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.tick_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(config.watch_interval_ms, MIN_INTERVAL_MS);
    }

    #[test]
    fn test_default_store_dir_under_app_dir() {
        let config = AppConfig::default();
        let dir = config.store_dir();
        assert!(dir.ends_with(Path::new(paths::APP_DIR).join(paths::STORE_DIRNAME)));
    }
}
