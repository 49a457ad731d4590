//! Configuration system for tsih maps.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TsihError, TsihResult};
use crate::versioning::VersionNumber;

/// Construction options for a [`crate::VersionedMap`].
///
/// A config carrying only a persistence target works as a template: clone it
/// and set a name for every map that should share the same database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Identifier scoping this map's rows in the backend. A fresh token is
    /// generated when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// SQLite database path. `None` keeps the map purely in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_target: Option<PathBuf>,
    /// Initial current version. Not derived from reloaded history.
    pub version: VersionNumber,
    /// Advance the version by one on every write.
    pub auto_version: bool,
}

impl MapConfig {
    /// Config for a purely in-memory map.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Config for a map mirrored to the SQLite database at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::default().with_persistence_target(path)
    }

    /// Set the identifier.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the SQLite database path.
    pub fn with_persistence_target(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence_target = Some(path.into());
        self
    }

    /// Set the initial current version.
    pub fn with_version(mut self, version: VersionNumber) -> Self {
        self.version = version;
        self
    }

    /// Enable or disable auto-versioning.
    pub fn with_auto_version(mut self, auto_version: bool) -> Self {
        self.auto_version = auto_version;
        self
    }

    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> TsihResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| TsihError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TsihError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| TsihError::Configuration(e.to_string())),
            _ => Err(TsihError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads:
    /// - `TSIH_NAME`
    /// - `TSIH_DB_PATH` (default: None = in-memory)
    /// - `TSIH_VERSION` (default: 0)
    /// - `TSIH_AUTO_VERSION` (default: false)
    pub fn from_env() -> TsihResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TsihResult<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("TSIH_NAME") {
            config.name = Some(name);
        }

        if let Some(path) = lookup("TSIH_DB_PATH") {
            config.persistence_target = Some(PathBuf::from(path));
        }

        if let Some(version) = lookup("TSIH_VERSION") {
            config.version = version.trim().parse().map_err(|_| {
                TsihError::Configuration(format!("TSIH_VERSION is not a version: {}", version))
            })?;
        }

        if let Some(auto) = lookup("TSIH_AUTO_VERSION") {
            config.auto_version = match auto.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(TsihError::Configuration(format!(
                        "TSIH_AUTO_VERSION must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        Ok(config)
    }
}
