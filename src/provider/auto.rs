//! Automatic provider selection
//!
//! Header data is free, so it wins whenever it describes the actual client.
//! When a relay sits between the client and the edge network, the edge's
//! connecting-IP header names the relay rather than the address being
//! resolved; its location headers then describe the relay too, and the
//! database is used instead. With no usable backend the result is the
//! canonical unknown location, never an error.

use super::header::CONNECTING_IP_HEADER;
use super::{Provider, RequestContext};
use crate::error::Result;
use crate::location::LocationResult;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct AutoProvider {
    header: Arc<dyn Provider>,
    database: Arc<dyn Provider>,
    mismatch_logged: AtomicBool,
    no_provider_logged: AtomicBool,
}

impl AutoProvider {
    pub fn new(header: Arc<dyn Provider>, database: Arc<dyn Provider>) -> Self {
        Self {
            header,
            database,
            mismatch_logged: AtomicBool::new(false),
            no_provider_logged: AtomicBool::new(false),
        }
    }

    /// Whether the edge saw the same client we are resolving.
    ///
    /// A missing connecting-IP header leaves nothing to compare, so the
    /// headers are trusted.
    fn connecting_ip_matches(ip: &str, context: Option<&RequestContext>) -> bool {
        let Some(connecting_ip) = context.and_then(|c| c.non_empty_header(CONNECTING_IP_HEADER)) else {
            return true;
        };
        normalize_ip(ip) == normalize_ip(connecting_ip)
    }

    /// Logs the first mismatch only; returns whether this call logged
    fn warn_ip_mismatch(&self, ip: &str, context: Option<&RequestContext>) -> bool {
        if self.mismatch_logged.swap(true, Ordering::AcqRel) {
            return false;
        }
        let connecting_ip = context
            .and_then(|c| c.header(CONNECTING_IP_HEADER))
            .unwrap_or_default();
        log::info!(
            "IP mismatch detected: requested IP ({}) differs from {} ({}). \
             An upstream proxy likely sits in front of the edge network; \
             using the {} provider for accurate geolocation",
            ip,
            CONNECTING_IP_HEADER,
            connecting_ip,
            self.database.name()
        );
        true
    }

    /// Logs the first occurrence only; returns whether this call logged
    fn warn_no_providers(&self) -> bool {
        if self.no_provider_logged.swap(true, Ordering::AcqRel) {
            return false;
        }
        log::warn!(
            "No IP geolocation provider available; returning Unknown for all lookups. \
             Enable edge-network location headers or install a GeoLite2-City database"
        );
        true
    }
}

/// Canonical comparison form of an address.
///
/// IPv4-mapped IPv6 becomes plain IPv4. Unparsable input falls back to its
/// trimmed, lowercased text so the comparison stays deterministic.
pub fn normalize_ip(ip: &str) -> String {
    let value = ip.trim();
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string().to_lowercase(),
        },
        Ok(addr) => addr.to_string(),
        Err(_) => value.to_lowercase(),
    }
}

#[async_trait]
impl Provider for AutoProvider {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn is_available(&self, context: Option<&RequestContext>) -> bool {
        self.header.is_available(context) || self.database.is_available(context)
    }

    async fn locate(&self, ip: &str, context: Option<&RequestContext>) -> Result<LocationResult> {
        if self.header.is_available(context) {
            if Self::connecting_ip_matches(ip, context) {
                log::debug!("Locating {} with the {} provider", ip, self.header.name());
                return self.header.locate(ip, context).await;
            }
            self.warn_ip_mismatch(ip, context);
        }

        if self.database.is_available(context) {
            log::debug!("Locating {} with the {} provider", ip, self.database.name());
            return match self.database.locate(ip, context).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    log::error!("{} provider failed for {}: {}", self.database.name(), ip, e);
                    Ok(LocationResult::unknown())
                }
            };
        }

        self.warn_no_providers();
        Ok(LocationResult::unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;
    use crate::location::LocationDetails;
    use crate::provider::header::{CITY_HEADER, COUNTRY_HEADER};
    use crate::provider::testing::ScriptedProvider;
    use crate::provider::HeaderProvider;

    fn result(code: &str, city: &str) -> LocationResult {
        LocationResult::new(code, code, city, LocationDetails::default())
    }

    fn edge_request(connecting_ip: Option<&str>) -> RequestContext {
        let mut ctx = RequestContext::new()
            .with_header(COUNTRY_HEADER, "GB")
            .with_header(CITY_HEADER, "London");
        if let Some(ip) = connecting_ip {
            ctx.insert(CONNECTING_IP_HEADER, ip);
        }
        ctx
    }

    fn providers(
        header_available: bool,
        database_available: bool,
    ) -> (Arc<ScriptedProvider>, Arc<ScriptedProvider>, AutoProvider) {
        let header = Arc::new(ScriptedProvider::new(header_available, result("GB", "London")));
        let database = Arc::new(ScriptedProvider::new(database_available, result("IN", "Mumbai")));
        let auto = AutoProvider::new(header.clone(), database.clone());
        (header, database, auto)
    }

    #[test]
    fn test_normalize_ip() {
        assert_eq!(normalize_ip("2001:0db8:0000:0000:0000:0000:0000:0001"), "2001:db8::1");
        assert_eq!(normalize_ip("2001:DB8::1"), "2001:db8::1");
        assert_eq!(normalize_ip("::ffff:203.0.113.9"), "203.0.113.9");
        assert_eq!(normalize_ip(" 8.8.8.8 "), "8.8.8.8");
        assert_eq!(normalize_ip("Not-An-IP"), "not-an-ip");
    }

    #[test]
    fn test_available_if_either_provider_is() {
        assert!(providers(true, false).2.is_available(None));
        assert!(providers(false, true).2.is_available(None));
        assert!(!providers(false, false).2.is_available(None));
    }

    #[tokio::test]
    async fn test_uses_header_when_connecting_ip_matches() {
        let (header, database, auto) = providers(true, true);
        let ctx = edge_request(Some("81.2.69.142"));

        let located = auto.locate("81.2.69.142", Some(&ctx)).await.unwrap();
        assert_eq!(located.country_code(), Some("GB"));
        assert_eq!(header.calls(), 1);
        assert_eq!(database.calls(), 0);
    }

    #[tokio::test]
    async fn test_uses_header_when_formats_are_equivalent() {
        let (_, database, auto) = providers(true, true);

        let ctx = edge_request(Some("2001:db8::1"));
        auto.locate("2001:0db8:0000:0000:0000:0000:0000:0001", Some(&ctx)).await.unwrap();

        let ctx = edge_request(Some("::ffff:203.0.113.9"));
        auto.locate("203.0.113.9", Some(&ctx)).await.unwrap();

        assert_eq!(database.calls(), 0);
    }

    #[tokio::test]
    async fn test_uses_header_without_connecting_ip() {
        let (header, database, auto) = providers(true, true);
        let ctx = edge_request(None);

        auto.locate("104.255.87.245", Some(&ctx)).await.unwrap();
        assert_eq!(header.calls(), 1);
        assert_eq!(database.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_database_on_mismatch() {
        let (header, database, auto) = providers(true, true);
        let ctx = edge_request(Some("34.204.24.48"));

        let located = auto.locate("104.255.87.245", Some(&ctx)).await.unwrap();
        assert_eq!(located.country_code(), Some("IN"));
        assert_eq!(located.city(), "Mumbai");
        assert_eq!(header.calls(), 0);
        assert_eq!(database.calls(), 1);

        // repeated mismatches keep falling back
        auto.locate("104.255.87.245", Some(&ctx)).await.unwrap();
        assert_eq!(database.calls(), 2);
    }

    #[tokio::test]
    async fn test_mismatch_without_database_is_unknown() {
        let (header, _, auto) = providers(true, false);
        let ctx = edge_request(Some("34.204.24.48"));

        let located = auto.locate("104.255.87.245", Some(&ctx)).await.unwrap();
        assert!(located.is_unknown());
        assert_eq!(header.calls(), 0);
    }

    #[tokio::test]
    async fn test_uses_database_without_headers() {
        let (_, database, auto) = providers(false, true);
        let located = auto.locate("8.8.8.8", None).await.unwrap();
        assert_eq!(located.country_code(), Some("IN"));
        assert_eq!(database.calls(), 1);
    }

    #[tokio::test]
    async fn test_nothing_available_is_unknown() {
        let (header, database, auto) = providers(false, false);
        for _ in 0..3 {
            let located = auto.locate("8.8.8.8", None).await.unwrap();
            assert_eq!(located, LocationResult::unknown());
        }
        assert_eq!(header.calls() + database.calls(), 0);
    }

    #[tokio::test]
    async fn test_mismatch_notice_fires_once() {
        let (_, _, auto) = providers(true, true);
        let ctx = edge_request(Some("34.204.24.48"));

        for _ in 0..3 {
            auto.locate("104.255.87.245", Some(&ctx)).await.unwrap();
        }
        assert!(!auto.warn_ip_mismatch("104.255.87.245", Some(&ctx)));
        // the other notice is tracked separately
        assert!(auto.warn_no_providers());
    }

    #[tokio::test]
    async fn test_no_provider_notice_fires_once() {
        let (_, _, auto) = providers(false, false);

        for _ in 0..3 {
            auto.locate("8.8.8.8", None).await.unwrap();
        }
        assert!(!auto.warn_no_providers());
        assert!(auto.warn_ip_mismatch("8.8.8.8", None));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_notices_fire_once_under_concurrency() {
        let auto = Arc::new(providers(false, false).2);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let auto = Arc::clone(&auto);
                tokio::spawn(async move {
                    let mismatch = auto.warn_ip_mismatch("104.255.87.245", None);
                    let no_provider = auto.warn_no_providers();
                    (mismatch as usize, no_provider as usize)
                })
            })
            .collect();

        let (mut mismatches, mut no_providers) = (0, 0);
        for task in tasks {
            let (m, n) = task.await.unwrap();
            mismatches += m;
            no_providers += n;
        }
        assert_eq!(mismatches, 1);
        assert_eq!(no_providers, 1);
    }

    struct BrokenDatabase;

    #[async_trait]
    impl Provider for BrokenDatabase {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn is_available(&self, _context: Option<&RequestContext>) -> bool {
            true
        }

        async fn locate(&self, _ip: &str, _context: Option<&RequestContext>) -> Result<LocationResult> {
            Err(GeoError::LookupTimeout {
                timeout: std::time::Duration::from_secs(3),
            })
        }
    }

    #[tokio::test]
    async fn test_database_failure_degrades_to_unknown() {
        let auto = AutoProvider::new(Arc::new(HeaderProvider::new()), Arc::new(BrokenDatabase));
        let located = auto.locate("8.8.8.8", None).await.unwrap();
        assert!(located.is_unknown());
    }

    #[tokio::test]
    async fn test_with_real_header_provider() {
        let auto = AutoProvider::new(
            Arc::new(HeaderProvider::new()),
            Arc::new(ScriptedProvider::new(true, result("IN", "Mumbai"))),
        );
        let ctx = edge_request(Some("81.2.69.142"));

        let located = auto.locate("81.2.69.142", Some(&ctx)).await.unwrap();
        assert_eq!(located.country_code(), Some("GB"));
        assert_eq!(located.city(), "London");
    }
}
