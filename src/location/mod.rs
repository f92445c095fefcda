//! Location result value type

pub mod countries;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use countries::country_name;

/// Placeholder for missing country and city names
pub const UNKNOWN: &str = "Unknown";

/// White flag shown when no country is known
pub const UNKNOWN_FLAG: &str = "\u{1F3F3}\u{FE0F}";

/// Optional enrichment fields, each independently present or absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationDetails {
    pub region: Option<String>,
    pub region_code: Option<String>,
    pub continent: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postal_code: Option<String>,
    pub metro_code: Option<String>,
}

/// Result of a single lookup.
///
/// Every field serializes, absent ones as `null`, so consumers can rely on
/// key presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    country_code: Option<String>,
    country_name: String,
    city: String,
    flag_emoji: String,
    region: Option<String>,
    region_code: Option<String>,
    continent: Option<String>,
    timezone: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    postal_code: Option<String>,
    metro_code: Option<String>,
}

impl LocationResult {
    /// Build a result for a resolved country. The flag is derived from the code.
    pub fn new(
        country_code: impl Into<String>,
        country_name: impl Into<String>,
        city: impl Into<String>,
        details: LocationDetails,
    ) -> Self {
        let country_code = country_code.into();
        Self {
            flag_emoji: flag_emoji(Some(&country_code)),
            country_code: Some(country_code),
            country_name: country_name.into(),
            city: city.into(),
            region: details.region,
            region_code: details.region_code,
            continent: details.continent,
            timezone: details.timezone,
            latitude: details.latitude,
            longitude: details.longitude,
            postal_code: details.postal_code,
            metro_code: details.metro_code,
        }
    }

    /// The canonical result used when no country-level data is available
    pub fn unknown() -> Self {
        Self {
            country_code: None,
            country_name: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            flag_emoji: UNKNOWN_FLAG.to_string(),
            region: None,
            region_code: None,
            continent: None,
            timezone: None,
            latitude: None,
            longitude: None,
            postal_code: None,
            metro_code: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.country_code.is_none()
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn flag_emoji(&self) -> &str {
        &self.flag_emoji
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn region_code(&self) -> Option<&str> {
        self.region_code.as_deref()
    }

    pub fn continent(&self) -> Option<&str> {
        self.continent.as_deref()
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }

    pub fn metro_code(&self) -> Option<&str> {
        self.metro_code.as_deref()
    }

    // Aliases

    pub fn country(&self) -> &str {
        self.country_name()
    }

    pub fn emoji(&self) -> &str {
        self.flag_emoji()
    }

    pub fn emoji_flag(&self) -> &str {
        self.flag_emoji()
    }

    pub fn country_flag(&self) -> &str {
        self.flag_emoji()
    }

    /// Flat mapping of every field, absent values as `Value::Null`
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Map a country code to its regional-indicator flag.
///
/// ASCII letters become regional indicator symbols; anything else (such as the
/// digit in `T1`) is kept as-is. No code yields [`UNKNOWN_FLAG`].
pub fn flag_emoji(country_code: Option<&str>) -> String {
    match country_code {
        Some(code) => code
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() {
                    char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)).unwrap_or(c)
                } else {
                    c
                }
            })
            .collect(),
        None => UNKNOWN_FLAG.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn berlin() -> LocationResult {
        LocationResult::new(
            "DE",
            "Germany",
            "Berlin",
            LocationDetails {
                region: Some("Berlin".into()),
                region_code: Some("BE".into()),
                continent: Some("EU".into()),
                timezone: Some("Europe/Berlin".into()),
                latitude: Some(52.52),
                longitude: Some(13.405),
                postal_code: Some("10115".into()),
                metro_code: None,
            },
        )
    }

    #[test]
    fn test_flag_emoji() {
        assert_eq!(flag_emoji(Some("US")), "🇺🇸");
        assert_eq!(flag_emoji(Some("FR")), "🇫🇷");
        assert_eq!(flag_emoji(Some("BR")), "🇧🇷");
        assert_eq!(flag_emoji(None), UNKNOWN_FLAG);
    }

    #[test]
    fn test_flag_emoji_keeps_non_letters() {
        assert_eq!(flag_emoji(Some("T1")), "\u{1F1F9}1");
    }

    #[test]
    fn test_new_derives_flag() {
        let result = berlin();
        assert_eq!(result.country_code(), Some("DE"));
        assert_eq!(result.flag_emoji(), "🇩🇪");
        assert!(!result.is_unknown());
    }

    #[test]
    fn test_unknown_result() {
        let result = LocationResult::unknown();
        assert!(result.is_unknown());
        assert_eq!(result.country_code(), None);
        assert_eq!(result.country_name(), "Unknown");
        assert_eq!(result.city(), "Unknown");
        assert_eq!(result.flag_emoji(), "🏳️");
        assert_eq!(result.region(), None);
        assert_eq!(result.latitude(), None);
        assert_eq!(result.metro_code(), None);
    }

    #[test]
    fn test_aliases() {
        let result = berlin();
        assert_eq!(result.country(), "Germany");
        assert_eq!(result.emoji(), "🇩🇪");
        assert_eq!(result.emoji_flag(), "🇩🇪");
        assert_eq!(result.country_flag(), "🇩🇪");
    }

    #[test]
    fn test_map_matches_accessors() {
        let result = berlin();
        let map = result.to_map();

        assert_eq!(map.len(), 12);
        assert_eq!(map["country_code"], "DE");
        assert_eq!(map["country_name"], result.country_name());
        assert_eq!(map["city"], result.city());
        assert_eq!(map["flag_emoji"], result.flag_emoji());
        assert_eq!(map["region"], "Berlin");
        assert_eq!(map["region_code"], "BE");
        assert_eq!(map["continent"], "EU");
        assert_eq!(map["timezone"], "Europe/Berlin");
        assert_eq!(map["latitude"].as_f64(), result.latitude());
        assert_eq!(map["longitude"].as_f64(), result.longitude());
        assert_eq!(map["postal_code"], "10115");
        assert_eq!(map["metro_code"], Value::Null);
    }

    #[test]
    fn test_map_keeps_absent_keys() {
        let map = LocationResult::unknown().to_map();
        for key in [
            "country_code",
            "region",
            "region_code",
            "continent",
            "timezone",
            "latitude",
            "longitude",
            "postal_code",
            "metro_code",
        ] {
            assert_eq!(map.get(key), Some(&Value::Null), "{} should be null", key);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let result = berlin();
        let json = serde_json::to_string(&result).unwrap();
        let back: LocationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
