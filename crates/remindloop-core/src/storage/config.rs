//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - The default nag interval
//! - Message personality
//! - Focus check-in queue shape
//! - Runtime polling cadence
//!
//! Configuration is stored at `~/.config/remindloop/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::data_dir;
use crate::controller::ControllerConfig;
use crate::error::ConfigError;
use crate::messages::Personality;

/// Reminder behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Minutes between nags when a trigger carries no interval of its own.
    /// Zero or negative means "use the built-in fallback".
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: i64,
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_check_in_queue_size")]
    pub check_in_queue_size: u32,
    #[serde(default = "default_check_in_interval_minutes")]
    pub check_in_interval_minutes: i64,
}

/// Long-running loop settings used by `remindloop run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_one")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_one")]
    pub hyperfocus_tick_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/remindloop/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_interval_minutes() -> i64 {
    5
}
fn default_personality() -> String {
    Personality::default().as_str().into()
}
fn default_check_in_queue_size() -> u32 {
    8
}
fn default_check_in_interval_minutes() -> i64 {
    15
}
fn default_one() -> u64 {
    1
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            default_interval_minutes: default_interval_minutes(),
            personality: default_personality(),
            check_in_queue_size: default_check_in_queue_size(),
            check_in_interval_minutes: default_check_in_interval_minutes(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 1,
            hyperfocus_tick_secs: 1,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }
        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value has the wrong shape.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        if key == "reminders.personality" {
            value
                .parse::<Personality>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
        }
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Every leaf key with its current value, in `section.key` form.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) else {
            return out;
        };
        for (section, body) in sections {
            if let serde_json::Value::Object(fields) = body {
                for (field, value) in fields {
                    let rendered = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    out.push((format!("{section}.{field}"), rendered));
                }
            }
        }
        out.sort();
        out
    }

    /// Settings for the lifecycle controller. A personality that does not
    /// parse falls back to the default with a warning.
    pub fn controller_config(&self) -> ControllerConfig {
        let r = &self.reminders;
        let personality = r.personality.parse::<Personality>().unwrap_or_else(|e| {
            warn!(personality = %r.personality, error = %e, "unknown personality, using default");
            Personality::default()
        });
        ControllerConfig {
            default_interval_minutes: Some(r.default_interval_minutes).filter(|m| *m > 0),
            personality,
            check_in_queue_size: r.check_in_queue_size as usize,
            check_in_interval_minutes: r.check_in_interval_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.reminders.default_interval_minutes, 5);
        assert_eq!(parsed.reminders.personality, "cheerful");
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[reminders]\ndefault_interval_minutes = 12\n").unwrap();
        assert_eq!(parsed.reminders.default_interval_minutes, 12);
        assert_eq!(parsed.reminders.check_in_queue_size, 8);
        assert_eq!(parsed.runtime.poll_interval_secs, 1);
    }

    #[test]
    fn get_by_dot_path() {
        let cfg = Config::default();
        assert_eq!(cfg.get("reminders.default_interval_minutes").as_deref(), Some("5"));
        assert_eq!(cfg.get("reminders.personality").as_deref(), Some("cheerful"));
        assert!(cfg.get("reminders.nope").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_value_checks_keys_and_types() {
        let mut cfg = Config::default();
        cfg.set_value("reminders.default_interval_minutes", "-1").unwrap();
        assert_eq!(cfg.reminders.default_interval_minutes, -1);

        assert!(matches!(
            cfg.set_value("reminders.bogus", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set_value("runtime.poll_interval_secs", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("reminders.personality", "pirate"),
            Err(ConfigError::InvalidValue { .. })
        ));
        cfg.set_value("reminders.personality", "drill-sergeant").unwrap();
    }

    #[test]
    fn non_positive_default_interval_is_dropped() {
        let mut cfg = Config::default();
        assert_eq!(cfg.controller_config().default_interval_minutes, Some(5));
        cfg.reminders.default_interval_minutes = 0;
        assert_eq!(cfg.controller_config().default_interval_minutes, None);
    }

    #[test]
    fn unknown_personality_falls_back() {
        let mut cfg = Config::default();
        cfg.reminders.personality = "pirate".into();
        assert_eq!(cfg.controller_config().personality, Personality::default());
    }

    #[test]
    fn entries_are_flat_and_sorted() {
        let entries = Config::default().entries();
        assert!(entries.iter().any(|(k, v)| k == "runtime.hyperfocus_tick_secs" && v == "1"));
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.reminders.check_in_queue_size = 3;
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().reminders.check_in_queue_size, 3);
    }
}
