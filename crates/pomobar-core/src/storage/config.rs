//! TOML-based application settings.
//!
//! A flat record of the user's preferences:
//! - Phase lengths and the long-break interval
//! - Sound and notification toggles
//! - Daily goal
//! - Full-cycle and auto-start modes
//! - Global shortcut bindings
//!
//! Stored at `~/.config/pomobar/config.toml`. Settings are always replaced
//! wholesale; invalid numbers are clamped to 1 instead of rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::data_dir;
use crate::error::ConfigError;
use crate::hotkey::{default_shortcuts, HotkeyAction, ShortcutBinding};
use crate::timer::CycleConfig;

/// Flat keys accepted by [`Config::get`] and [`Config::with_value`].
/// Shortcut fields are addressed as `shortcuts.<index>.<field>`.
pub const CONFIG_KEYS: [&str; 9] = [
    "work_minutes",
    "short_break_minutes",
    "long_break_minutes",
    "long_break_interval",
    "sound_enabled",
    "notifications_enabled",
    "daily_goal",
    "full_cycle_mode",
    "auto_start_next",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    /// Work sessions before a long break.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Completed work sessions per day.
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
    /// `false` = work timer only, `true` = work/break cycle.
    #[serde(default)]
    pub full_cycle_mode: bool,
    #[serde(default = "default_true")]
    pub auto_start_next: bool,
    #[serde(default = "default_shortcuts")]
    pub shortcuts: Vec<ShortcutBinding>,
}

// Default functions
fn default_work_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_daily_goal() -> u32 {
    8
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            long_break_interval: default_long_break_interval(),
            sound_enabled: true,
            notifications_enabled: true,
            daily_goal: default_daily_goal(),
            full_cycle_mode: false,
            auto_start_next: true,
            shortcuts: default_shortcuts(),
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
            current = match current {
                serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
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

        let mut current = root;
        for part in key.split('.') {
            current = match current {
                serde_json::Value::Array(items) => {
                    let index = part.parse::<usize>().map_err(|_| unknown())?;
                    items.get_mut(index).ok_or_else(unknown)?
                }
                serde_json::Value::Object(map) => map.get_mut(part).ok_or_else(unknown)?,
                _ => return Err(unknown()),
            };
        }

        let new_value = match &*current {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(format!("cannot parse '{value}' as bool: {e}")))?,
            ),
            serde_json::Value::Number(_) => {
                let n = value
                    .parse::<i64>()
                    .map_err(|e| invalid(format!("cannot parse '{value}' as integer: {e}")))?;
                let clamped = n.clamp(1, i64::from(u32::MAX));
                if clamped != n {
                    warn!(key, value = n, clamped, "config value out of range, clamped");
                }
                serde_json::Value::Number(clamped.into())
            }
            serde_json::Value::String(_) => serde_json::Value::String(value.to_string()),
            // Modifier lists: comma-separated.
            serde_json::Value::Array(items) if items.iter().all(serde_json::Value::is_string) => {
                serde_json::Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(|m| serde_json::Value::String(m.to_string()))
                        .collect(),
                )
            }
            _ => return Err(unknown()),
        };

        *current = new_value;
        Ok(())
    }

    /// Clamp every numeric setting to at least one.
    pub fn sanitized(mut self) -> Self {
        self.work_minutes = self.work_minutes.max(1);
        self.short_break_minutes = self.short_break_minutes.max(1);
        self.long_break_minutes = self.long_break_minutes.max(1);
        self.long_break_interval = self.long_break_interval.max(1);
        self.daily_goal = self.daily_goal.max(1);
        self
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg.sanitized())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, writing defaults");
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

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default settings");
            Self::default()
        })
    }

    /// Get a config value as string. Shortcut entries are addressed as
    /// `shortcuts.<index>.<field>`.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Return a copy with one flat setting changed. Numbers below one are
    /// clamped to one.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        let mut json = serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(updated.sanitized())
    }

    /// Copy with the cycle settings replaced, everything else kept.
    pub fn with_cycle(&self, cycle: &CycleConfig) -> Self {
        Self {
            work_minutes: cycle.work_minutes,
            short_break_minutes: cycle.short_break_minutes,
            long_break_minutes: cycle.long_break_minutes,
            long_break_interval: cycle.long_break_interval,
            full_cycle_mode: cycle.full_cycle_mode,
            auto_start_next: cycle.auto_start_next,
            ..self.clone()
        }
    }

    pub fn with_daily_goal(&self, goal: i64) -> Self {
        let mut updated = self.clone();
        updated.daily_goal = goal.clamp(1, i64::from(u32::MAX)) as u32;
        updated
    }

    pub fn shortcut(&self, action: HotkeyAction) -> Option<&ShortcutBinding> {
        self.shortcuts.iter().find(|s| s.action == action)
    }

    /// Replace the binding for the same action. Unknown actions are ignored.
    pub fn with_shortcut(&self, binding: ShortcutBinding) -> Self {
        let mut updated = self.clone();
        if let Some(slot) = updated
            .shortcuts
            .iter_mut()
            .find(|s| s.action == binding.action)
        {
            *slot = binding;
        }
        updated
    }
}
