//! Local database provider
//!
//! Looks addresses up in a GeoLite2-City database file. Reader handles come
//! from a process-wide pool that is built on first use; each lookup holds a
//! handle only while fetching the raw record, under a hard timeout.

pub mod pool;
pub mod reader;
pub mod record;

use super::{Provider, RequestContext};
use crate::config::{Config, MemoryMode};
use crate::error::{GeoError, Result};
use crate::ip;
use crate::location::LocationResult;
use async_trait::async_trait;
use pool::ReaderPool;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub use reader::{ReaderOpener, RecordReader, default_opener};
pub use record::CityRecord;

/// Database-backed provider
pub struct DatabaseProvider {
    opener: Arc<dyn ReaderOpener>,
    database_path: PathBuf,
    memory_mode: MemoryMode,
    pool_size: usize,
    pool_wait: Duration,
    lookup_timeout: Duration,
    pool: RwLock<Option<Arc<ReaderPool>>>,
}

impl DatabaseProvider {
    pub fn new(config: &Config) -> Self {
        Self::with_opener(config, default_opener())
    }

    pub fn with_opener(config: &Config, opener: Arc<dyn ReaderOpener>) -> Self {
        Self {
            opener,
            database_path: config.database_path.clone(),
            memory_mode: config.memory_mode,
            pool_size: config.pool_size,
            pool_wait: config.pool_wait(),
            lookup_timeout: config.lookup_timeout(),
            pool: RwLock::new(None),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn database_exists(&self) -> bool {
        self.database_path.is_file()
    }

    /// Drop the current pool so the next lookup opens fresh handles.
    ///
    /// Lookups already holding a handle finish against the file they opened.
    pub fn invalidate_pool(&self) {
        match self.pool.write() {
            Ok(mut pool) => {
                if pool.take().is_some() {
                    log::info!("Reader pool for {:?} invalidated", self.database_path);
                }
            }
            Err(e) => log::error!("Failed to acquire pool write lock: {}", e),
        }
    }

    /// Get or build the shared pool
    fn pool(&self) -> Result<Arc<ReaderPool>> {
        {
            let pool = self
                .pool
                .read()
                .map_err(|e| GeoError::backend(format!("Failed to acquire pool read lock: {}", e)))?;
            if let Some(pool) = pool.as_ref() {
                return Ok(Arc::clone(pool));
            }
        }

        let mut pool = self
            .pool
            .write()
            .map_err(|e| GeoError::backend(format!("Failed to acquire pool write lock: {}", e)))?;

        let pool = pool.get_or_insert_with(|| {
            log::info!(
                "Creating reader pool for {:?} (size {}, {:?} mode)",
                self.database_path,
                self.pool_size,
                self.memory_mode
            );
            Arc::new(ReaderPool::new(
                Arc::clone(&self.opener),
                self.database_path.clone(),
                self.memory_mode,
                self.pool_size,
            ))
        });
        Ok(Arc::clone(pool))
    }

    /// Fetch the raw record under the pool-wait and lookup timeouts
    async fn fetch(&self, ip: IpAddr) -> Result<Option<CityRecord>> {
        let pool = self.pool()?;
        let mut handle = pool.acquire(self.pool_wait).await?;

        let task = tokio::task::spawn_blocking(move || handle.lookup(ip));

        match tokio::time::timeout(self.lookup_timeout, task).await {
            Ok(Ok(result)) => result.map_err(|e| {
                log::error!("Error fetching IP data for {}: {}", ip, e);
                e
            }),
            Ok(Err(e)) => {
                log::error!("Lookup task for {} failed: {}", ip, e);
                Err(GeoError::backend(format!("lookup task failed: {}", e)))
            }
            Err(_) => {
                log::warn!("Lookup for {} timed out after {:?}", ip, self.lookup_timeout);
                Err(GeoError::LookupTimeout {
                    timeout: self.lookup_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for DatabaseProvider {
    fn name(&self) -> &'static str {
        "database"
    }

    fn is_available(&self, _context: Option<&RequestContext>) -> bool {
        self.opener.is_available() && self.database_exists()
    }

    /// Look `ip` up in the database file.
    ///
    /// On `LookupTimeout` the blocking read keeps running and holds its pool
    /// slot until it returns, so a stuck reader can make later calls fail
    /// with `PoolExhausted`.
    async fn locate(&self, ip: &str, _context: Option<&RequestContext>) -> Result<LocationResult> {
        if !self.database_exists() {
            return Err(GeoError::DatabaseNotFound(self.database_path.clone()));
        }
        if !self.opener.is_available() {
            return Err(GeoError::BackendUnavailable(format!(
                "{} reader cannot open {:?}; rebuild with the `maxmind` feature",
                self.opener.name(),
                self.database_path
            )));
        }

        let addr = ip::parse(ip)?;
        let record = self.fetch(addr).await?;
        Ok(record::normalize(record))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeOpener, record_for};
    use super::*;
    use tempfile::TempDir;

    fn config_with_db() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("GeoLite2-City.mmdb");
        std::fs::write(&file, b"fake").unwrap();

        let mut config = Config::default();
        config.database_path = file;
        (dir, config)
    }

    #[test]
    fn test_available_requires_file_and_reader() {
        let (dir, config) = config_with_db();
        let provider = DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::empty()));
        assert!(provider.is_available(None));

        let unavailable = FakeOpener {
            available: false,
            ..FakeOpener::empty()
        };
        let provider = DatabaseProvider::with_opener(&config, Arc::new(unavailable));
        assert!(!provider.is_available(None));

        let mut missing = config.clone();
        missing.database_path = dir.path().join("missing.mmdb");
        let provider = DatabaseProvider::with_opener(&missing, Arc::new(FakeOpener::empty()));
        assert!(!provider.is_available(None));
    }

    #[tokio::test]
    async fn test_locate_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database_path = dir.path().join("missing.mmdb");

        let provider = DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::empty()));
        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        match err {
            GeoError::DatabaseNotFound(path) => assert!(path.ends_with("missing.mmdb")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_locate_backend_unavailable() {
        let (_dir, config) = config_with_db();
        let opener = FakeOpener {
            available: false,
            ..FakeOpener::empty()
        };
        let provider = DatabaseProvider::with_opener(&config, Arc::new(opener));
        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        assert!(matches!(err, GeoError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_locate_normalizes_record() {
        let (_dir, config) = config_with_db();
        let provider =
            DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::with_record(record_for("FR"))));

        let result = provider.locate("2.2.2.2", None).await.unwrap();
        assert_eq!(result.country_code(), Some("FR"));
        assert_eq!(result.country_name(), "Country FR");
        assert_eq!(result.city(), "City FR");
        assert_eq!(result.flag_emoji(), "🇫🇷");
    }

    #[tokio::test]
    async fn test_locate_address_not_found_is_unknown() {
        let (_dir, config) = config_with_db();
        let provider = DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::empty()));
        let result = provider.locate("8.8.8.8", None).await.unwrap();
        assert!(result.is_unknown());
    }

    #[tokio::test]
    async fn test_locate_rejects_malformed_ip() {
        let (_dir, config) = config_with_db();
        let provider = DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::empty()));
        let err = provider.locate("not-an-ip", None).await.unwrap_err();
        assert!(matches!(err, GeoError::InvalidFormat(_)));
    }

    #[tokio::test]
    async fn test_locate_times_out() {
        let (_dir, mut config) = config_with_db();
        config.set_timeout_seconds(0.05).unwrap();
        let opener = FakeOpener {
            delay: Duration::from_millis(300),
            ..FakeOpener::with_record(record_for("US"))
        };
        let provider = DatabaseProvider::with_opener(&config, Arc::new(opener));

        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        assert!(matches!(err, GeoError::LookupTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_timed_out_read_holds_its_slot() {
        let (_dir, mut config) = config_with_db();
        config.set_pool_size(1).unwrap();
        config.set_timeout_seconds(0.05).unwrap();
        config.set_pool_wait_seconds(0.05).unwrap();
        let opener = FakeOpener {
            delay: Duration::from_millis(400),
            ..FakeOpener::with_record(record_for("US"))
        };
        let provider = DatabaseProvider::with_opener(&config, Arc::new(opener));

        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        assert!(matches!(err, GeoError::LookupTimeout { .. }));

        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        assert!(matches!(err, GeoError::PoolExhausted { .. }));
    }

    #[tokio::test]
    async fn test_locate_wraps_reader_failures() {
        let (_dir, config) = config_with_db();
        let provider = DatabaseProvider::with_opener(&config, Arc::new(FakeOpener::failing()));
        let err = provider.locate("8.8.8.8", None).await.unwrap_err();
        assert!(matches!(err, GeoError::BackendError(_)));
    }

    #[tokio::test]
    async fn test_pool_is_shared_and_invalidated() {
        let (_dir, config) = config_with_db();
        let opener = Arc::new(FakeOpener::with_record(record_for("JP")));
        let provider = DatabaseProvider::with_opener(&config, opener.clone());

        provider.locate("1.1.1.1", None).await.unwrap();
        provider.locate("1.0.0.1", None).await.unwrap();
        assert_eq!(opener.opened(), 1);
        assert_eq!(opener.lookups(), 2);

        provider.invalidate_pool();
        provider.locate("1.1.1.1", None).await.unwrap();
        assert_eq!(opener.opened(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_builds_one_pool() {
        let (_dir, mut config) = config_with_db();
        config.set_pool_size(2).unwrap();
        let opener = Arc::new(FakeOpener {
            delay: Duration::from_millis(20),
            ..FakeOpener::with_record(record_for("BR"))
        });
        let provider = Arc::new(DatabaseProvider::with_opener(&config, opener.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.locate("8.8.4.4", None).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().country_code(), Some("BR"));
        }
        assert!(opener.opened() <= 2);
        assert_eq!(opener.lookups(), 8);
    }
}
