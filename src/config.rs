//! Startup configuration.
//!
//! Device paths, tick interval, store location and bus capacity are supplied
//! once at startup and validated before any thread is spawned.

use crate::types::DeviceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "APODEMUS_CONFIG";

/// Main configuration for the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raw input devices to monitor, one monitor thread each.
    pub devices: Vec<DeviceConfig>,

    /// Sampling interval shared by monitors and the heartbeat.
    #[serde(rename = "tick_interval_ms", with = "duration_ms")]
    pub tick_interval: Duration,

    /// SQLite database file.
    pub database_path: PathBuf,

    /// Capacity of the sample bus. Producers block once it is full.
    pub bus_capacity: usize,

    /// Stop every producer after this many ticks. `None` runs until shutdown.
    pub max_ticks: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devices: vec![
                DeviceConfig::new(DeviceKind::Mouse, "/dev/input/event16"),
                DeviceConfig::new(DeviceKind::Keyboard, "/dev/input/event19"),
            ],
            tick_interval: Duration::from_secs(1),
            database_path: PathBuf::from("./usage_stats.db"),
            bus_capacity: 2,
            max_ticks: None,
        }
    }
}

impl Config {
    /// Load configuration from `$APODEMUS_CONFIG` or the default location.
    ///
    /// A missing file at the default location yields the defaults. A file
    /// named by `$APODEMUS_CONFIG` must exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_override(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    fn load_with_override(override_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match override_path {
            Some(path) => Self::load_explicit(&path),
            None => Self::load_from(&Self::config_path()),
        }
    }

    /// Load configuration from a specific file, falling back to the defaults
    /// if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        Self::load_explicit(path)
    }

    /// Load configuration from a file that must exist.
    pub fn load_explicit(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.display())))?;
        let config = Self::from_json(&content)?;
        tracing::info!(path = ?path, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a JSON document. Missing fields take defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apodemus")
            .join("config.json")
    }

    /// Checks the configuration before any resource is opened.
    ///
    /// Two entries pointing at the same device node are rejected, even with
    /// different labels or when one of them goes through a symlink.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices configured".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick interval must be non-zero".into()));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Invalid("bus capacity must be non-zero".into()));
        }
        if self.max_ticks == Some(0) {
            return Err(ConfigError::Invalid("max_ticks must be non-zero".into()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.kind == DeviceKind::Heartbeat {
                return Err(ConfigError::Invalid(format!(
                    "{} cannot use the heartbeat label",
                    device.path.display()
                )));
            }
            if device.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{} device has an empty path",
                    device.kind
                )));
            }
            if !seen.insert(device_identity(&device.path)) {
                return Err(ConfigError::Invalid(format!(
                    "device {} is configured more than once",
                    device.path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Resolves symlinks and `..` so aliases of one node compare equal.
///
/// Paths that cannot be resolved (missing devices) are normalized lexically;
/// the open phase reports them.
fn device_identity(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// One raw input device and the label its samples carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    pub path: PathBuf,
}

impl DeviceConfig {
    pub fn new(kind: DeviceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as integer milliseconds.
mod duration_ms {
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
