//! Configuration module for geolocator
//!
//! Handles loading, overriding and validating lookup settings. A `Config` is
//! built once at startup and handed to the [`Locator`](crate::Locator); every
//! setter validates its input so bad values fail here rather than on the
//! first lookup.

use crate::error::{GeoError, Result};
use crate::utils::path;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which backend answers lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderKind {
    /// Edge headers when trustworthy, local database otherwise
    Auto,
    /// Edge-network request headers only
    Header,
    /// Local GeoLite2 database only
    Database,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Auto => "auto",
            ProviderKind::Header => "header",
            ProviderKind::Database => "database",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProviderKind::Auto),
            "header" | "header-source" | "cloudflare" => Ok(ProviderKind::Header),
            "database" | "database-source" | "maxmind" => Ok(ProviderKind::Database),
            other => Err(GeoError::config(format!(
                "Invalid provider: {}. Must be one of: auto, header, database",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ProviderKind {
    type Error = GeoError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the database reader accesses the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Read the whole file into memory when a reader opens
    Memory,
    /// Memory-map the file and page records in on demand
    Mmap,
}

impl FromStr for MemoryMode {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(MemoryMode::Memory),
            "mmap" | "file" => Ok(MemoryMode::Mmap),
            other => Err(GeoError::config(format!(
                "Invalid memory mode: {}. Must be one of: memory, mmap",
                other
            ))),
        }
    }
}

/// Lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Selected provider
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Location of the GeoLite2-City database file
    #[serde(default = "crate::utils::path::default_database_path")]
    pub database_path: PathBuf,

    /// Hard limit on a single record fetch
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Maximum number of open reader handles
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long to wait for a free reader handle
    #[serde(default = "default_timeout_seconds")]
    pub pool_wait_seconds: f64,

    #[serde(default = "default_memory_mode")]
    pub memory_mode: MemoryMode,

    /// Refuse private and loopback addresses
    #[serde(default = "default_true")]
    pub reject_private_ips: bool,
}

// Default value functions
fn default_provider() -> ProviderKind {
    ProviderKind::Auto
}

fn default_timeout_seconds() -> f64 {
    3.0
}

fn default_pool_size() -> usize {
    5
}

fn default_memory_mode() -> MemoryMode {
    MemoryMode::Memory
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            database_path: path::default_database_path(),
            timeout_seconds: default_timeout_seconds(),
            pool_size: default_pool_size(),
            pool_wait_seconds: default_timeout_seconds(),
            memory_mode: default_memory_mode(),
            reject_private_ips: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn load(config_file: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_file).map_err(|e| {
            GeoError::config(format!("Failed to read config file {:?}: {}", config_file, e))
        })?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.database_path = path::expand_tilde(&config.database_path.to_string_lossy());
        config.validate()?;
        Ok(config)
    }

    /// Apply GEOLOCATOR_* environment variable overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("GEOLOCATOR_PROVIDER") {
            self.set_provider(&val)?;
        }
        if let Some(val) = lookup("GEOLOCATOR_DB_PATH") {
            self.set_database_path(&val);
        }
        if let Some(val) = lookup("GEOLOCATOR_TIMEOUT") {
            self.set_timeout_seconds(parse_number("GEOLOCATOR_TIMEOUT", &val)?)?;
        }
        if let Some(val) = lookup("GEOLOCATOR_POOL_SIZE") {
            let size = val.trim().parse::<usize>().map_err(|_| {
                GeoError::config(format!("GEOLOCATOR_POOL_SIZE is not a whole number: {}", val))
            })?;
            self.set_pool_size(size)?;
        }
        if let Some(val) = lookup("GEOLOCATOR_POOL_WAIT") {
            self.set_pool_wait_seconds(parse_number("GEOLOCATOR_POOL_WAIT", &val)?)?;
        }
        if let Some(val) = lookup("GEOLOCATOR_MEMORY_MODE") {
            self.memory_mode = val.parse()?;
        }
        if let Some(val) = lookup("GEOLOCATOR_REJECT_PRIVATE_IPS") {
            self.reject_private_ips = parse_bool("GEOLOCATOR_REJECT_PRIVATE_IPS", &val)?;
        }
        Ok(())
    }

    /// Check every field; used after deserialization
    pub fn validate(&self) -> Result<()> {
        check_positive("timeout_seconds", self.timeout_seconds)?;
        check_positive("pool_wait_seconds", self.pool_wait_seconds)?;
        if self.pool_size == 0 {
            return Err(GeoError::config("pool_size must be greater than zero"));
        }
        Ok(())
    }

    pub fn set_provider(&mut self, name: &str) -> Result<()> {
        self.provider = name.parse()?;
        Ok(())
    }

    pub fn set_database_path(&mut self, database_path: &str) {
        self.database_path = path::expand_tilde(database_path);
    }

    pub fn set_timeout_seconds(&mut self, seconds: f64) -> Result<()> {
        check_positive("timeout_seconds", seconds)?;
        self.timeout_seconds = seconds;
        Ok(())
    }

    pub fn set_pool_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(GeoError::config("pool_size must be greater than zero"));
        }
        self.pool_size = size;
        Ok(())
    }

    pub fn set_pool_wait_seconds(&mut self, seconds: f64) -> Result<()> {
        check_positive("pool_wait_seconds", seconds)?;
        self.pool_wait_seconds = seconds;
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    pub fn pool_wait(&self) -> Duration {
        Duration::from_secs_f64(self.pool_wait_seconds)
    }
}

fn check_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeoError::config(format!(
            "{} must be a positive number of seconds, got {}",
            field, value
        )))
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GeoError::config(format!("{} is not a number: {}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GeoError::config(format!("{} is not a boolean: {}", key, value))),
    }
}
