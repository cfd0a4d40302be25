//! TOML-based application configuration.
//!
//! Stores deployment preferences for the distraction gate:
//! - The package set a fresh install blocks
//! - Enforcement agent identity, OS-chrome allowlist and debounce cooldown
//! - Host settings screens opened by the capability probe
//!
//! Configuration is stored at `~/.config/sakina/config.toml`. Gate state
//! itself (enabled, window, blocked set, unlock) is not configuration; it
//! lives in the settings store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::gate::DEFAULT_BLOCKED_PACKAGES;

/// Gate defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Blocked set used when no settings have been stored yet, or on reset.
    #[serde(default = "default_blocked_packages")]
    pub default_blocked_packages: Vec<String>,
}

/// Enforcement agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Package id of the controlling app. Never intercepted.
    #[serde(default = "default_controlling_package")]
    pub controlling_package: String,
    /// OS-chrome packages (system UI, launchers, settings). Never intercepted.
    #[serde(default = "default_system_packages")]
    pub system_packages: Vec<String>,
    /// Repeat interceptions of the same package inside this window are dropped.
    #[serde(default = "default_debounce_cooldown_ms")]
    pub debounce_cooldown_ms: u64,
    /// Deep link opened to bring the user back into the controlling app.
    #[serde(default = "default_interstitial_uri")]
    pub interstitial_uri: String,
}

/// Capability probe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// URI of the host screen granting foreground observation. Empty when
    /// the host has no such screen.
    #[serde(default = "default_foreground_settings_uri")]
    pub foreground_settings_uri: String,
    /// URI of the host screen granting usage access.
    #[serde(default = "default_usage_settings_uri")]
    pub usage_settings_uri: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/sakina/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

// Default functions
fn default_blocked_packages() -> Vec<String> {
    DEFAULT_BLOCKED_PACKAGES
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}
fn default_controlling_package() -> String {
    "app.sakina".into()
}
fn default_system_packages() -> Vec<String> {
    [
        "com.android.systemui",
        "com.android.launcher3",
        "com.google.android.apps.nexuslauncher",
        "com.android.settings",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}
fn default_debounce_cooldown_ms() -> u64 {
    2_000
}
fn default_interstitial_uri() -> String {
    "sakina://gate".into()
}

#[cfg(target_os = "macos")]
fn default_foreground_settings_uri() -> String {
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility".into()
}
#[cfg(target_os = "windows")]
fn default_foreground_settings_uri() -> String {
    "ms-settings:privacy".into()
}
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_foreground_settings_uri() -> String {
    String::new()
}

#[cfg(target_os = "macos")]
fn default_usage_settings_uri() -> String {
    "x-apple.systempreferences:com.apple.preference.security?Privacy_AllFiles".into()
}
#[cfg(target_os = "windows")]
fn default_usage_settings_uri() -> String {
    "ms-settings:privacy-appdiagnostics".into()
}
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_usage_settings_uri() -> String {
    String::new()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_blocked_packages: default_blocked_packages(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controlling_package: default_controlling_package(),
            system_packages: default_system_packages(),
            debounce_cooldown_ms: default_debounce_cooldown_ms(),
            interstitial_uri: default_interstitial_uri(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            foreground_settings_uri: default_foreground_settings_uri(),
            usage_settings_uri: default_usage_settings_uri(),
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
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|e| invalid(e.to_string()))?
                            .into(),
                    ),
                    serde_json::Value::Array(_) => {
                        // Accept a JSON array or a comma-separated list.
                        if value.trim_start().starts_with('[') {
                            serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                        } else {
                            serde_json::Value::Array(
                                value
                                    .split(',')
                                    .map(str::trim)
                                    .filter(|s| !s.is_empty())
                                    .map(|s| serde_json::Value::String(s.to_string()))
                                    .collect(),
                            )
                        }
                    }
                    serde_json::Value::Object(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default location, `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, or return defaults if no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning defaults on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("using default configuration: {e}");
                Self::default()
            }
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
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

    /// Set a config value by key in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Debounce cooldown as a chrono duration.
    pub fn debounce_cooldown(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(
            i64::try_from(self.agent.debounce_cooldown_ms).unwrap_or(i64::MAX),
        )
    }
}
