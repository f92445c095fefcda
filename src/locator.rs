//! Locator - validates input, applies the private-IP policy and delegates to
//! the configured provider

use crate::config::Config;
use crate::error::{GeoError, Result};
use crate::ip;
use crate::location::LocationResult;
use crate::provider::{DatabaseProvider, Provider, ProviderSet, ReaderOpener, RequestContext};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Replaces the database file with the latest release.
///
/// Implementations should write to a temporary file and rename it over
/// `database_path` so readers never see a partial file.
#[async_trait]
pub trait DatabaseRefresh: Send + Sync {
    async fn refresh(&self, database_path: &Path) -> Result<()>;
}

/// Entry point for lookups
///
/// The provider is chosen once from the configuration. `Locator` is cheap to
/// share behind an `Arc` across request handlers.
pub struct Locator {
    config: Config,
    provider: Arc<dyn Provider>,
    database: Arc<DatabaseProvider>,
}

impl Locator {
    /// Create a locator with the compiled-in database reader
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let providers = ProviderSet::new(&config);
        Ok(Self::from_providers(config, providers))
    }

    /// Create a locator that opens the database through `opener`
    pub fn with_opener(config: Config, opener: Arc<dyn ReaderOpener>) -> Result<Self> {
        config.validate()?;
        let providers = ProviderSet::with_opener(&config, opener);
        Ok(Self::from_providers(config, providers))
    }

    fn from_providers(config: Config, providers: ProviderSet) -> Self {
        let provider = providers.select(config.provider);
        log::info!(
            "Geolocation provider: {} (database {:?})",
            provider.name(),
            config.database_path
        );
        Self {
            config,
            provider,
            database: providers.database,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Whether the selected provider can answer for this request
    pub fn is_available(&self, context: Option<&RequestContext>) -> bool {
        self.provider.is_available(context)
    }

    /// Locate `ip`, optionally using the inbound request's headers.
    ///
    /// # Returns
    ///
    /// * `Ok(LocationResult)` - location, or the canonical unknown result
    /// * `Err(GeoError::InvalidFormat)` - malformed address
    /// * `Err(GeoError::PrivateIpRejected)` - private address refused by policy
    /// * `Err(GeoError)` - any failure of an explicitly selected provider
    pub async fn locate(&self, ip: &str, context: Option<&RequestContext>) -> Result<LocationResult> {
        ip::validate(ip)?;

        if self.config.reject_private_ips && !ip.is_empty() && ip::is_private(ip)? {
            return Err(GeoError::PrivateIpRejected(ip.to_string()));
        }

        self.provider.locate(ip, context).await
    }

    pub fn database_exists(&self) -> bool {
        self.database.database_exists()
    }

    /// Run an external refresh, then drop pooled readers of the old file
    pub async fn refresh_database(&self, refresher: &dyn DatabaseRefresh) -> Result<()> {
        let path = self.database.database_path();
        log::info!("Refreshing GeoIP database at {:?}", path);

        refresher.refresh(path).await.map_err(|e| {
            log::error!("Error updating GeoIP database: {}", e);
            e
        })?;

        self.database.invalidate_pool();
        log::info!("GeoIP database updated successfully");
        Ok(())
    }
}
