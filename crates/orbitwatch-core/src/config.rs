//! Startup configuration.
//!
//! Freshness windows, cadences and endpoint URLs are all configuration, not
//! behaviour of the core. Values come from, in increasing precedence:
//! built-in defaults, `~/.config/orbitwatch/config.json`, and `ORBITWATCH_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::scheduler::poll::DEFAULT_POSITION_CADENCE_MS;
use crate::scheduler::ScheduleConfig;

/// Application name used for config directory paths
const APP_NAME: &str = "orbitwatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_POSITION_URL: &str = "http://api.open-notify.org/iss-now";
const DEFAULT_CREW_URL: &str = "http://api.open-notify.org/astros";

/// Position freshness window. Equal to the cadence, so every tick refetches.
const DEFAULT_POSITION_WINDOW_MS: u64 = 2500;

/// Crew freshness window. The roster changes rarely.
const DEFAULT_CREW_WINDOW_MS: u64 = 3333;

/// An environment override that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredSetting {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub position_url: String,
    pub crew_url: String,
    pub position_window_ms: u64,
    pub crew_window_ms: u64,
    pub position_cadence_ms: u64,
    pub crew_cadence_ms: Option<u64>,
    pub request_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            position_url: DEFAULT_POSITION_URL.to_string(),
            crew_url: DEFAULT_CREW_URL.to_string(),
            position_window_ms: DEFAULT_POSITION_WINDOW_MS,
            crew_window_ms: DEFAULT_CREW_WINDOW_MS,
            position_cadence_ms: DEFAULT_POSITION_CADENCE_MS,
            crew_cadence_ms: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_dir: None,
        }
    }
}

impl FeedConfig {
    /// Load from the user config file, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from `ORBITWATCH_*` environment variables.
    ///
    /// Unparsable values leave the field unchanged and are returned so the
    /// caller can report them once logging is up.
    pub fn apply_env(&mut self) -> Vec<IgnoredSetting> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Vec<IgnoredSetting> {
        if let Some(url) = var("ORBITWATCH_POSITION_URL") {
            self.position_url = url;
        }
        if let Some(url) = var("ORBITWATCH_CREW_URL") {
            self.crew_url = url;
        }
        if let Some(dir) = var("ORBITWATCH_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }

        let mut ignored = Vec::new();
        let mut number = |key: &'static str| -> Option<u64> {
            let raw = var(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    ignored.push(IgnoredSetting {
                        key,
                        value: raw,
                        reason: e.to_string(),
                    });
                    None
                }
            }
        };

        if let Some(v) = number("ORBITWATCH_POSITION_WINDOW_MS") {
            self.position_window_ms = v;
        }
        if let Some(v) = number("ORBITWATCH_CREW_WINDOW_MS") {
            self.crew_window_ms = v;
        }
        if let Some(v) = number("ORBITWATCH_POSITION_CADENCE_MS") {
            self.position_cadence_ms = v;
        }
        if let Some(v) = number("ORBITWATCH_CREW_CADENCE_MS") {
            self.crew_cadence_ms = Some(v);
        }
        if let Some(v) = number("ORBITWATCH_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        ignored
    }

    pub fn validate(&self) -> Result<()> {
        if self.position_url.trim().is_empty() {
            bail!("position_url must not be empty");
        }
        if self.crew_url.trim().is_empty() {
            bail!("crew_url must not be empty");
        }
        if self.position_window_ms == 0 || self.crew_window_ms == 0 {
            bail!("freshness windows must be greater than zero");
        }
        if self.position_cadence_ms == 0 || self.crew_cadence_ms == Some(0) {
            bail!("cadences must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn position_window(&self) -> Duration {
        Duration::from_millis(self.position_window_ms)
    }

    pub fn crew_window(&self) -> Duration {
        Duration::from_millis(self.crew_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn schedule(&self) -> ScheduleConfig {
        let config = ScheduleConfig::new(Duration::from_millis(self.position_cadence_ms));
        match self.crew_cadence_ms {
            Some(ms) => config.with_crew_cadence(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = FeedConfig::default();
        config.validate().unwrap();
        assert!(config.position_window() < config.crew_window());
        assert_eq!(config.schedule(), ScheduleConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: FeedConfig = serde_json::from_str(r#"{"crew_window_ms": 60000}"#).unwrap();
        assert_eq!(config.crew_window(), Duration::from_secs(60));
        assert_eq!(config.position_url, DEFAULT_POSITION_URL);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("orbitwatch-test-missing").join(CONFIG_FILE);
        assert_eq!(FeedConfig::load_from(&path).unwrap(), FeedConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = FeedConfig::default();
        let ignored = config.apply_vars(vars(&[
            ("ORBITWATCH_POSITION_URL", "http://localhost:8080/iss-now"),
            ("ORBITWATCH_POSITION_WINDOW_MS", "1000"),
            ("ORBITWATCH_CREW_CADENCE_MS", "60000"),
        ]));

        assert!(ignored.is_empty());
        assert_eq!(config.position_url, "http://localhost:8080/iss-now");
        assert_eq!(config.position_window_ms, 1000);
        assert_eq!(config.schedule().crew_cadence, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_env_number_is_reported() {
        let mut config = FeedConfig::default();
        let ignored = config.apply_vars(vars(&[
            ("ORBITWATCH_REQUEST_TIMEOUT_SECS", "not-a-number"),
            ("ORBITWATCH_CREW_WINDOW_MS", " 5000 "),
        ]));

        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.crew_window_ms, 5000);
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].key, "ORBITWATCH_REQUEST_TIMEOUT_SECS");
        assert_eq!(ignored[0].value, "not-a-number");
        assert!(!ignored[0].reason.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let config = FeedConfig {
            position_window_ms: 0,
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FeedConfig {
            crew_cadence_ms: Some(0),
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FeedConfig {
            crew_url: " ".to_string(),
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
