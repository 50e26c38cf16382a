//! Runtime configuration.
//!
//! Loaded from a JSON file and re-read by the scheduler at the top of every
//! cycle, so edits to the watch list or poll windows take effect without a
//! restart.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config has no items to watch")]
    NoItems,
    #[error("{tier} poll interval minimum {min}s exceeds maximum {max}s")]
    ReversedPollWindow {
        tier: &'static str,
        min: u64,
        max: u64,
    },
}

/// Check cadence tier for a watched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            other => {
                warn!(priority = other, "unknown priority value, treating as normal");
                Ok(Priority::Normal)
            }
        }
    }
}

/// One entry in the watch list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub priority: Priority,
}

impl ItemSpec {
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    #[serde(default)]
    pub discord_webhook_url: String,
    #[serde(default = "default_domain")]
    pub amazon_domain: String,
    #[serde(default = "default_high_min")]
    pub poll_high_priority_min_seconds: u64,
    #[serde(default = "default_high_max")]
    pub poll_high_priority_max_seconds: u64,
    #[serde(default = "default_poll_min")]
    pub poll_interval_min_seconds: u64,
    #[serde(default = "default_poll_max")]
    pub poll_interval_max_seconds: u64,
    #[serde(default = "default_warmup_cycles")]
    pub warmup_every_n_cycles: u64,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

fn default_domain() -> String {
    "amazon.ca".to_string()
}

fn default_high_min() -> u64 {
    25
}

fn default_high_max() -> u64 {
    35
}

fn default_poll_min() -> u64 {
    45
}

fn default_poll_max() -> u64 {
    60
}

fn default_warmup_cycles() -> u64 {
    20
}

impl Config {
    /// Loads and validates the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.normalize()?;
        Ok(config)
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.items.is_empty() {
            return Err(ConfigError::NoItems);
        }
        if self.poll_high_priority_min_seconds > self.poll_high_priority_max_seconds {
            return Err(ConfigError::ReversedPollWindow {
                tier: "high priority",
                min: self.poll_high_priority_min_seconds,
                max: self.poll_high_priority_max_seconds,
            });
        }
        if self.poll_interval_min_seconds > self.poll_interval_max_seconds {
            return Err(ConfigError::ReversedPollWindow {
                tier: "normal",
                min: self.poll_interval_min_seconds,
                max: self.poll_interval_max_seconds,
            });
        }
        for item in &mut self.items {
            if item.label.is_empty() {
                item.label = item.id.clone();
            }
        }
        Ok(())
    }

    /// Watch list with high-priority items first, original order otherwise.
    pub fn sorted_items(&self) -> Vec<ItemSpec> {
        let mut items = self.items.clone();
        items.sort_by_key(|item| item.priority != Priority::High);
        items
    }

    pub fn has_high_priority(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.priority == Priority::High)
    }
}

/// Filesystem layout for everything the monitor persists.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config: PathBuf,
    pub state: PathBuf,
    pub cookies: PathBuf,
    pub debug_dir: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config: root.join("config.json"),
            state: root.join("state.json"),
            cookies: root.join("cookies.json"),
            debug_dir: root.join("debug"),
        }
    }

    /// Root directory comes from `STOCKWATCH_DATA_DIR`, defaulting to the
    /// conventional container mount point.
    pub fn from_env() -> Self {
        let root = std::env::var("STOCKWATCH_DATA_DIR").unwrap_or_else(|_| "/config".to_string());
        Self::new(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let mut file = fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        (dir, path)
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let (_dir, path) = write_config(r#"{"items": [{"id": "B000TEST01"}]}"#);
        let config = Config::load(&path).expect("config loads");

        assert_eq!(config.amazon_domain, "amazon.ca");
        assert_eq!(config.poll_high_priority_min_seconds, 25);
        assert_eq!(config.poll_high_priority_max_seconds, 35);
        assert_eq!(config.poll_interval_min_seconds, 45);
        assert_eq!(config.poll_interval_max_seconds, 60);
        assert_eq!(config.warmup_every_n_cycles, 20);
        assert_eq!(config.items.len(), 1);
        assert_eq!(config.items[0].label, "B000TEST01");
        assert_eq!(config.items[0].priority, Priority::Normal);
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn empty_watch_list_is_rejected() {
        let (_dir, path) = write_config(r#"{"items": []}"#);
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::NoItems));
    }

    #[test]
    fn reversed_poll_window_is_rejected() {
        let (_dir, path) = write_config(
            r#"{
                "poll_interval_min_seconds": 60,
                "poll_interval_max_seconds": 45,
                "items": [{"id": "B000TEST01"}]
            }"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ReversedPollWindow { tier: "normal", min: 60, max: 45 }
        ));

        let (_dir, path) = write_config(
            r#"{
                "poll_high_priority_min_seconds": 40,
                "poll_high_priority_max_seconds": 20,
                "items": [{"id": "B000TEST01"}]
            }"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ReversedPollWindow { tier: "high priority", .. }
        ));
    }

    #[test]
    fn unknown_priority_falls_back_to_normal() {
        let (_dir, path) = write_config(
            r#"{"items": [{"id": "B000TEST01", "priority": "urgent"}]}"#,
        );
        let config = Config::load(&path).expect("config loads");
        assert_eq!(config.items[0].priority, Priority::Normal);
    }

    #[test]
    fn sorted_items_puts_high_priority_first() {
        let (_dir, path) = write_config(
            r#"{"items": [
                {"id": "A", "priority": "normal"},
                {"id": "B", "priority": "high"},
                {"id": "C", "priority": "normal"},
                {"id": "D", "priority": "high"}
            ]}"#,
        );
        let config = Config::load(&path).expect("config loads");
        let ids: Vec<_> = config.sorted_items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, ["B", "D", "A", "C"]);
        assert!(config.has_high_priority());
    }
}
