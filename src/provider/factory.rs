//! Factory for creating provider instances
//!
//! Builds every concrete provider once and hands out the one a
//! [`ProviderKind`] names, so selection happens at configuration time.

use super::{AutoProvider, DatabaseProvider, HeaderProvider, Provider, ReaderOpener};
use crate::config::{Config, ProviderKind};
use std::sync::Arc;

/// The concrete providers for one configuration
pub struct ProviderSet {
    pub header: Arc<HeaderProvider>,
    pub database: Arc<DatabaseProvider>,
}

impl ProviderSet {
    pub fn new(config: &Config) -> Self {
        Self {
            header: Arc::new(HeaderProvider::new()),
            database: Arc::new(DatabaseProvider::new(config)),
        }
    }

    pub fn with_opener(config: &Config, opener: Arc<dyn ReaderOpener>) -> Self {
        Self {
            header: Arc::new(HeaderProvider::new()),
            database: Arc::new(DatabaseProvider::with_opener(config, opener)),
        }
    }

    pub fn select(&self, kind: ProviderKind) -> Arc<dyn Provider> {
        match kind {
            ProviderKind::Auto => Arc::new(AutoProvider::new(
                self.header.clone(),
                self.database.clone(),
            )),
            ProviderKind::Header => self.header.clone(),
            ProviderKind::Database => self.database.clone(),
        }
    }
}
