//! geolocator: resolve IP addresses to geographic locations
//!
//! Locations come from one of two places: location headers an edge network
//! (Cloudflare) attaches to inbound requests, or a local GeoLite2-City
//! database read through a bounded pool of reader handles. The `auto`
//! provider prefers headers when they describe the address being resolved
//! and falls back to the database otherwise.
//!
//! ```no_run
//! use geolocator::{Config, Locator, RequestContext};
//!
//! # async fn demo() -> geolocator::Result<()> {
//! let locator = Locator::new(Config::default())?;
//! let ctx = RequestContext::new().with_header("cf-ipcountry", "FR");
//! let location = locator.locate("81.2.69.142", Some(&ctx)).await?;
//! println!("{} {}", location.flag_emoji(), location.country_name());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ip;
pub mod location;
pub mod locator;
pub mod provider;
pub mod utils;

pub use config::{Config, MemoryMode, ProviderKind};
pub use error::{GeoError, Result};
pub use location::{LocationDetails, LocationResult};
pub use locator::{DatabaseRefresh, Locator};
pub use provider::{AutoProvider, DatabaseProvider, HeaderProvider, Provider, RequestContext};
