//! Error types for geolocator
//!
//! This module defines custom error types using thiserror for better error handling.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for geolocator
#[derive(Error, Debug)]
pub enum GeoError {
    /// Malformed IP address
    #[error("Invalid IP address format: {0}")]
    InvalidFormat(String),

    /// Private or loopback address refused by policy
    #[error("Private IP addresses are not allowed: {0}")]
    PrivateIpRejected(String),

    /// Header-based lookup invoked without a request context
    #[error("{0} requires a request context carrying edge-network location headers")]
    MissingRequestContext(&'static str),

    /// Database file missing on disk
    #[error(
        "GeoIP database not found at {0:?}. Download the GeoLite2-City database \
         (or run the database refresh) before using the database provider"
    )]
    DatabaseNotFound(PathBuf),

    /// Reader capability not compiled in or otherwise unusable
    #[error("Database backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No reader handle became free in time
    #[error("Timed out after {waited:?} waiting for a free database reader")]
    PoolExhausted { waited: Duration },

    /// Record fetch exceeded the lookup timeout
    #[error("Database lookup timed out after {timeout:?}")]
    LookupTimeout { timeout: Duration },

    /// Unexpected failure from the underlying reader
    #[error("Database error: {0}")]
    BackendError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(String),
}

/// Result type alias for geolocator
pub type Result<T> = std::result::Result<T, GeoError>;

impl GeoError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GeoError::ConfigError(msg.into())
    }

    /// Create a backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        GeoError::BackendError(msg.into())
    }

    /// Transient failures the caller may retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeoError::LookupTimeout { .. } | GeoError::PoolExhausted { .. }
        )
    }
}

impl From<serde_yaml::Error> for GeoError {
    fn from(err: serde_yaml::Error) -> Self {
        GeoError::YamlError(err.to_string())
    }
}
