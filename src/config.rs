//! Data logger configuration.
//!
//! The configuration file is JSON. Its contents are assumed to be validated
//! by whoever wrote it (usually the Brick Viewer front end); this module only
//! maps the file onto typed structures and fills in defaults.

use crate::timestamp::{DEFAULT_STRFTIME, TimeFormatKind, TimestampFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the host entry devices use unless told otherwise.
pub const DEFAULT_HOST: &str = "default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file as JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config has no \"default\" host")]
    NoDefaultHost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub hosts: BTreeMap<String, HostConfig>,
    pub data: DataConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub time_format: TimeFormatKind,
    #[serde(default = "default_strftime")]
    pub time_format_strftime: String,
    pub csv: CsvConfig,
}

impl DataConfig {
    /// The timestamp format for this session.
    pub fn timestamp_format(&self) -> TimestampFormat {
        TimestampFormat::new(self.time_format, &self.time_format_strftime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvConfig {
    pub enabled: bool,
    pub file_name: PathBuf,
    /// Rotate once the file grows beyond this many bytes; 0 disables rotation
    #[serde(default)]
    pub file_size: u64,
    /// Number of numbered backups kept on rotation
    #[serde(default = "default_file_count")]
    pub file_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub enabled: bool,
    pub file_name: PathBuf,
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name: PathBuf::from("logger_debug.log"),
            level: LogLevel::default(),
        }
    }
}

/// Log levels as they are named in the configuration file and on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            // tracing has no level above ERROR
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Device type name, e.g. "Temperature Bricklet"
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub values: BTreeMap<String, ValueConfig>,
    #[serde(default)]
    pub options: DeviceOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueConfig {
    /// Seconds between two reads; 0 disables the value
    pub interval: f64,
    #[serde(default)]
    pub subvalues: BTreeMap<String, bool>,
}

/// Device options, forwarded to the device as they are.
pub type DeviceOptions = BTreeMap<String, OptionValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub value: serde_json::Value,
}

fn default_strftime() -> String {
    DEFAULT_STRFTIME.to_string()
}

fn default_file_count() -> u32 {
    1
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        if !config.hosts.contains_key(DEFAULT_HOST) {
            return Err(ConfigError::NoDefaultHost);
        }
        Ok(config)
    }

    /// The host all devices are reached through.
    pub fn default_host(&self) -> Option<&HostConfig> {
        self.hosts.get(DEFAULT_HOST)
    }
}
