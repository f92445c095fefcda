//! Provider module for geolocator
//!
//! A provider answers two questions for a request: can it geolocate at all,
//! and if so, where is the address. All backends implement [`Provider`] so the
//! locator can hold whichever one configuration selected.
//!
//! # Module Organization
//!
//! - `header`: location from edge-network request headers
//! - `database`: location from a local GeoLite2 database through a reader pool
//! - `auto`: header source when trustworthy, database otherwise
//! - `factory`: builds the providers and selects one by [`ProviderKind`](crate::config::ProviderKind)

pub mod auto;
pub mod database;
pub mod factory;
pub mod header;

use crate::error::Result;
use crate::location::LocationResult;
use async_trait::async_trait;
use std::collections::HashMap;

pub use auto::AutoProvider;
pub use database::{DatabaseProvider, ReaderOpener, RecordReader};
pub use factory::ProviderSet;
pub use header::HeaderProvider;

/// Common trait for all location providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this provider can answer for the given request
    fn is_available(&self, context: Option<&RequestContext>) -> bool;

    /// Resolve `ip` to a location
    async fn locate(&self, ip: &str, context: Option<&RequestContext>) -> Result<LocationResult>;
}

/// Header names and values of an inbound request.
///
/// Lookups are case-sensitive; store names the way the host's HTTP layer
/// delivers them (lowercase for `http`-based stacks).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    headers: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Header value, `None` when missing or empty
    pub fn non_empty_header(&self, name: &str) -> Option<&str> {
        self.header(name).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl From<HashMap<String, String>> for RequestContext {
    fn from(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }
}

impl<K, V> FromIterator<(K, V)> for RequestContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            headers: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_headers() {
        let ctx = RequestContext::new()
            .with_header("cf-ipcountry", "US")
            .with_header("cf-ipcity", "");

        assert_eq!(ctx.header("cf-ipcountry"), Some("US"));
        assert_eq!(ctx.header("CF-IPCountry"), None);
        assert_eq!(ctx.non_empty_header("cf-ipcity"), None);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_request_context_from_iter() {
        let ctx: RequestContext = [("cf-ipcountry", "FR")].into_iter().collect();
        assert_eq!(ctx.header("cf-ipcountry"), Some("FR"));
        assert!(!ctx.is_empty());
    }
}
