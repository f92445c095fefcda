//! Edge-network header provider
//!
//! Reads the visitor location an upstream edge network (Cloudflare's IP
//! geolocation and visitor location headers) has already resolved and attached
//! to the request. No disk or network access.

use super::{Provider, RequestContext};
use crate::error::{GeoError, Result};
use crate::location::{self, LocationDetails, LocationResult, UNKNOWN};
use async_trait::async_trait;

pub const COUNTRY_HEADER: &str = "cf-ipcountry";
pub const CITY_HEADER: &str = "cf-ipcity";
pub const REGION_HEADER: &str = "cf-region";
pub const REGION_CODE_HEADER: &str = "cf-region-code";
pub const CONTINENT_HEADER: &str = "cf-ipcontinent";
pub const TIMEZONE_HEADER: &str = "cf-timezone";
pub const LATITUDE_HEADER: &str = "cf-iplatitude";
pub const LONGITUDE_HEADER: &str = "cf-iplongitude";
pub const POSTAL_CODE_HEADER: &str = "cf-postal-code";
pub const METRO_CODE_HEADER: &str = "cf-metro-code";

/// Client address as seen by the edge network
pub const CONNECTING_IP_HEADER: &str = "cf-connecting-ip";

/// Country code sent when the edge could not place the client
pub const UNKNOWN_CODE: &str = "XX";

/// Country code sent for Tor exit nodes
pub const TOR_CODE: &str = "T1";

/// Header-based provider
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderProvider;

impl HeaderProvider {
    pub fn new() -> Self {
        Self
    }

    /// Uppercased country code, `None` when missing or the unknown sentinel
    fn country_code(context: &RequestContext) -> Option<String> {
        let code = context.non_empty_header(COUNTRY_HEADER)?.trim().to_ascii_uppercase();
        if code.is_empty() || code == UNKNOWN_CODE {
            None
        } else {
            Some(code)
        }
    }

    fn text(context: &RequestContext, name: &str) -> Option<String> {
        context.non_empty_header(name).map(str::to_string)
    }

    fn coordinate(context: &RequestContext, name: &str) -> Option<f64> {
        context
            .non_empty_header(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

#[async_trait]
impl Provider for HeaderProvider {
    fn name(&self) -> &'static str {
        "header"
    }

    fn is_available(&self, context: Option<&RequestContext>) -> bool {
        context.and_then(Self::country_code).is_some()
    }

    async fn locate(&self, _ip: &str, context: Option<&RequestContext>) -> Result<LocationResult> {
        let context = context.ok_or(GeoError::MissingRequestContext("Header provider"))?;

        let Some(country_code) = Self::country_code(context) else {
            return Ok(LocationResult::unknown());
        };

        let country_name = location::country_name(&country_code).unwrap_or(UNKNOWN);
        let city = context.non_empty_header(CITY_HEADER).unwrap_or(UNKNOWN);

        let details = LocationDetails {
            region: Self::text(context, REGION_HEADER),
            region_code: Self::text(context, REGION_CODE_HEADER),
            continent: Self::text(context, CONTINENT_HEADER),
            timezone: Self::text(context, TIMEZONE_HEADER),
            latitude: Self::coordinate(context, LATITUDE_HEADER),
            longitude: Self::coordinate(context, LONGITUDE_HEADER),
            postal_code: Self::text(context, POSTAL_CODE_HEADER),
            metro_code: Self::text(context, METRO_CODE_HEADER),
        };

        Ok(LocationResult::new(country_code, country_name, city, details))
    }
}
