//! GeoLite2-City record schema and normalization
//!
//! Mirrors the parts of the City record the locator uses. Every level is
//! optional; [`normalize`] turns a record into a [`LocationResult`] in one pass.

use crate::location::{LocationDetails, LocationResult, UNKNOWN};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Locale code -> name
pub type Names = BTreeMap<String, String>;

const ENGLISH: &str = "en";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityRecord {
    pub country: Option<Country>,
    pub city: Option<City>,
    pub subdivisions: Option<Vec<Subdivision>>,
    pub continent: Option<Continent>,
    pub location: Option<Location>,
    pub postal: Option<Postal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Country {
    pub iso_code: Option<String>,
    pub names: Option<Names>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct City {
    pub names: Option<Names>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subdivision {
    pub iso_code: Option<String>,
    pub names: Option<Names>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Continent {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    pub time_zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub metro_code: Option<MetroCode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Postal {
    pub code: Option<String>,
}

/// Metro code as stored: numeric in GeoLite2, textual in some derived databases
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MetroCode {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for MetroCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetroCode::Number(n) => write!(f, "{}", n),
            MetroCode::Text(s) => f.write_str(s),
        }
    }
}

/// English name if present, otherwise the first name in locale order
pub fn preferred_name(names: Option<&Names>) -> Option<&str> {
    let names = names?;
    names
        .get(ENGLISH)
        .or_else(|| names.values().next())
        .map(String::as_str)
}

/// Build a result from an optional record.
///
/// No record, or no country code, yields the canonical unknown result.
/// Only the first subdivision is used.
pub fn normalize(record: Option<CityRecord>) -> LocationResult {
    let Some(record) = record else {
        return LocationResult::unknown();
    };

    let Some(country_code) = record.country.as_ref().and_then(|c| c.iso_code.clone()) else {
        return LocationResult::unknown();
    };

    let country_name = preferred_name(record.country.as_ref().and_then(|c| c.names.as_ref()))
        .unwrap_or(UNKNOWN)
        .to_string();
    let city = preferred_name(record.city.as_ref().and_then(|c| c.names.as_ref()))
        .unwrap_or(UNKNOWN)
        .to_string();

    let subdivision = record.subdivisions.as_ref().and_then(|subs| subs.first());
    let location = record.location.as_ref();

    let details = LocationDetails {
        region: subdivision
            .and_then(|s| preferred_name(s.names.as_ref()))
            .map(str::to_string),
        region_code: subdivision.and_then(|s| s.iso_code.clone()),
        continent: record.continent.and_then(|c| c.code),
        timezone: location.and_then(|l| l.time_zone.clone()),
        latitude: location.and_then(|l| l.latitude),
        longitude: location.and_then(|l| l.longitude),
        postal_code: record.postal.and_then(|p| p.code),
        metro_code: location
            .and_then(|l| l.metro_code.as_ref())
            .map(ToString::to_string),
    };

    LocationResult::new(country_code, country_name, city, details)
}
