//! Database reader seam
//!
//! [`ReaderOpener`] opens [`RecordReader`] handles on the database file. The
//! MaxMind implementation is compiled in with the `maxmind` feature; without
//! it the opener reports itself unavailable.

use super::record::CityRecord;
use crate::config::MemoryMode;
use crate::error::Result;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// One open handle on the database
pub trait RecordReader: Send + Sync {
    /// Fetch the record for `ip`; `Ok(None)` when the address is not in the database
    fn lookup(&self, ip: IpAddr) -> Result<Option<CityRecord>>;
}

/// Opens reader handles on a database file
pub trait ReaderOpener: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the reader implementation is usable in this process
    fn is_available(&self) -> bool;

    fn open(&self, database_path: &Path, mode: MemoryMode) -> Result<Box<dyn RecordReader>>;
}

/// Opener backed by the `maxminddb` crate when compiled in
pub fn default_opener() -> Arc<dyn ReaderOpener> {
    #[cfg(feature = "maxmind")]
    {
        Arc::new(maxmind::MaxMindOpener)
    }
    #[cfg(not(feature = "maxmind"))]
    {
        Arc::new(UnavailableOpener)
    }
}

/// Stand-in when no reader implementation is compiled in
#[derive(Debug, Default)]
pub struct UnavailableOpener;

impl ReaderOpener for UnavailableOpener {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn open(&self, _database_path: &Path, _mode: MemoryMode) -> Result<Box<dyn RecordReader>> {
        Err(crate::error::GeoError::BackendUnavailable(
            "no database reader compiled in; rebuild with the `maxmind` feature".to_string(),
        ))
    }
}

#[cfg(feature = "maxmind")]
pub mod maxmind {
    //! MaxMind DB reader

    use super::*;
    use crate::error::GeoError;
    use maxminddb::{MaxMindDBError, Reader};

    #[derive(Debug, Default)]
    pub struct MaxMindOpener;

    impl ReaderOpener for MaxMindOpener {
        fn name(&self) -> &'static str {
            "maxminddb"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn open(&self, database_path: &Path, mode: MemoryMode) -> Result<Box<dyn RecordReader>> {
            log::debug!("Opening GeoIP database {:?} ({:?} mode)", database_path, mode);

            let reader: Box<dyn RecordReader> = match mode {
                MemoryMode::Memory => Box::new(MaxMindReader {
                    reader: Reader::open_readfile(database_path).map_err(|e| open_error(database_path, e))?,
                }),
                MemoryMode::Mmap => Box::new(MaxMindReader {
                    reader: Reader::open_mmap(database_path).map_err(|e| open_error(database_path, e))?,
                }),
            };
            Ok(reader)
        }
    }

    fn open_error(database_path: &Path, err: MaxMindDBError) -> GeoError {
        match err {
            MaxMindDBError::IoError(msg) if !database_path.exists() => {
                log::debug!("Database vanished before open: {}", msg);
                GeoError::DatabaseNotFound(database_path.to_path_buf())
            }
            e => GeoError::backend(format!("Failed to open {:?}: {}", database_path, e)),
        }
    }

    pub struct MaxMindReader<S: AsRef<[u8]>> {
        reader: Reader<S>,
    }

    impl<S> RecordReader for MaxMindReader<S>
    where
        S: AsRef<[u8]> + Send + Sync,
    {
        fn lookup(&self, ip: IpAddr) -> Result<Option<CityRecord>> {
            match self.reader.lookup::<CityRecord>(ip) {
                Ok(record) => Ok(Some(record)),
                Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
                Err(e) => Err(GeoError::backend(format!("lookup of {} failed: {}", ip, e))),
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_opener() {
        let opener = UnavailableOpener;
        assert!(!opener.is_available());
        assert!(opener.open(Path::new("db/x.mmdb"), MemoryMode::Memory).is_err());
    }

    #[test]
    fn test_default_opener_matches_features() {
        assert_eq!(default_opener().is_available(), cfg!(feature = "maxmind"));
    }
}
