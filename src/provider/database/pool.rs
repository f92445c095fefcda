//! Bounded pool of database reader handles
//!
//! Handles are opened lazily up to `size`. A semaphore permit is held for as
//! long as a caller owns a handle; waiting for a permit is bounded by the
//! caller's wait timeout.

use super::reader::{ReaderOpener, RecordReader};
use super::record::CityRecord;
use crate::config::MemoryMode;
use crate::error::{GeoError, Result};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ReaderPool {
    opener: Arc<dyn ReaderOpener>,
    database_path: PathBuf,
    mode: MemoryMode,
    size: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn RecordReader>>>,
}

impl ReaderPool {
    pub fn new(
        opener: Arc<dyn ReaderOpener>,
        database_path: PathBuf,
        mode: MemoryMode,
        size: usize,
    ) -> Self {
        Self {
            opener,
            database_path,
            mode,
            size,
            permits: Arc::new(Semaphore::new(size)),
            idle: Mutex::new(Vec::with_capacity(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Handles currently checked out
    pub fn in_use(&self) -> usize {
        self.size - self.permits.available_permits()
    }

    /// Opened handles waiting for reuse
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Wait up to `wait` for a free slot
    pub async fn acquire(self: &Arc<Self>, wait: Duration) -> Result<PooledReader> {
        let permit = match tokio::time::timeout(wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(GeoError::backend("reader pool closed")),
            Err(_) => {
                log::warn!("All {} database readers busy for {:?}", self.size, wait);
                return Err(GeoError::PoolExhausted { waited: wait });
            }
        };

        let reader = self
            .idle
            .lock()
            .map_err(|e| GeoError::backend(format!("Failed to acquire pool lock: {}", e)))?
            .pop();

        Ok(PooledReader {
            pool: Arc::clone(self),
            reader,
            _permit: permit,
        })
    }
}

/// A checked-out slot. Returns its handle to the pool on drop.
pub struct PooledReader {
    pool: Arc<ReaderPool>,
    reader: Option<Box<dyn RecordReader>>,
    _permit: OwnedSemaphorePermit,
}

impl PooledReader {
    /// Look up `ip`, opening a handle first if this slot has none yet.
    ///
    /// Blocking; run it off the async executor.
    pub fn lookup(&mut self, ip: IpAddr) -> Result<Option<CityRecord>> {
        if self.reader.is_none() {
            let pool = &self.pool;
            self.reader = Some(pool.opener.open(&pool.database_path, pool.mode)?);
        }
        match self.reader.as_ref() {
            Some(reader) => reader.lookup(ip),
            None => Err(GeoError::backend("reader handle missing")),
        }
    }
}

impl Drop for PooledReader {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push(reader);
            }
        }
    }
}
