//! Path utilities for the database file
//!
//! Handles host-root detection and tilde expansion.

use std::env;
use std::path::PathBuf;

/// Environment variable naming the host application's root directory
pub const ROOT_ENV: &str = "GEOLOCATOR_ROOT";

/// Database file location relative to the host root
pub const DEFAULT_DATABASE_FILE: &str = "db/GeoLite2-City.mmdb";

/// Get the default database path
///
/// Priority:
/// 1. $GEOLOCATOR_ROOT/db/GeoLite2-City.mmdb
/// 2. db/GeoLite2-City.mmdb relative to the working directory
pub fn default_database_path() -> PathBuf {
    match env::var(ROOT_ENV) {
        Ok(root) if !root.is_empty() => expand_tilde(&root).join(DEFAULT_DATABASE_FILE),
        _ => PathBuf::from(DEFAULT_DATABASE_FILE),
    }
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
