//! CLI module for geolocator
//!
//! Builds a [`Config`] from an optional file, environment overrides and
//! flags, then resolves each address given on the command line.

use anyhow::{Context, Result, bail};
use clap::Parser;
use geolocator::{Config, LocationResult, Locator, RequestContext};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "geolocator")]
#[command(version, about = "Resolve IP addresses to geographic locations")]
#[command(long_about = "Resolve IP addresses from edge-network location headers \
    or a local GeoLite2-City database.\n\n\
    Examples:\n  \
    $ geolocator 81.2.69.142\n  \
    $ geolocator --provider header -H cf-ipcountry=FR -H cf-ipcity=Paris 81.2.69.142\n  \
    $ geolocator --db ~/GeoLite2-City.mmdb --json 2001:4860:4860::8888")]
pub struct Cli {
    /// IP addresses to resolve
    #[arg(value_name = "IP", required = true)]
    pub ips: Vec<String>,

    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Provider: auto, header or database
    #[arg(short, long, value_name = "NAME")]
    pub provider: Option<String>,

    /// Path to the GeoLite2-City database
    #[arg(long, value_name = "PATH")]
    pub db: Option<String>,

    /// Resolve private and loopback addresses instead of rejecting them
    #[arg(long)]
    pub allow_private: bool,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE")]
    pub headers: Vec<String>,

    /// Output JSON format
    #[arg(short, long)]
    pub json: bool,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = self.build_config()?;
        let locator = Locator::new(config).context("Invalid configuration")?;
        let context = self.request_context()?;
        let context = (!context.is_empty()).then_some(&context);

        let mut failed = 0;
        for ip in &self.ips {
            match locator.locate(ip, context).await {
                Ok(location) => self.print_location(ip, &location)?,
                Err(e) => {
                    eprintln!("{} -> {}", ip, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} lookups failed", failed, self.ips.len());
        }
        Ok(())
    }

    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(file) => Config::load(file)?,
            None => {
                let mut config = Config::default();
                config.apply_env()?;
                config
            }
        };

        if let Some(provider) = &self.provider {
            config.set_provider(provider)?;
        }
        if let Some(db) = &self.db {
            config.set_database_path(db);
        }
        if self.allow_private {
            config.reject_private_ips = false;
        }
        Ok(config)
    }

    /// Header names are lowercased to match what HTTP stacks deliver
    fn request_context(&self) -> Result<RequestContext> {
        let mut context = RequestContext::new();
        for header in &self.headers {
            let Some((name, value)) = header.split_once('=') else {
                bail!("Invalid header {:?}, expected NAME=VALUE", header);
            };
            let name = name.trim();
            if name.is_empty() {
                bail!("Invalid header {:?}, name is empty", header);
            }
            context.insert(name.to_ascii_lowercase(), value);
        }
        Ok(context)
    }

    fn print_location(&self, ip: &str, location: &LocationResult) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(&location.to_map())?;
            println!("{}", json);
        } else {
            println!("{} -> {}", ip, summary(location));
        }
        Ok(())
    }
}

fn summary(location: &LocationResult) -> String {
    let mut parts = vec![format!("{} {}", location.flag_emoji(), location.country_name())];
    if let Some(code) = location.country_code() {
        parts[0].push_str(&format!(" ({})", code));
    }
    if let Some(region) = location.region() {
        parts.push(region.to_string());
    }
    parts.push(location.city().to_string());
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolocator::{LocationDetails, ProviderKind};

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "geolocator",
            "--provider",
            "header",
            "--allow-private",
            "-H",
            "CF-IPCountry=FR",
            "-H",
            "cf-ipcity=Saint-Denis=93",
            "10.0.0.1",
        ])
        .unwrap();

        let config = cli.build_config().unwrap();
        assert_eq!(config.provider, ProviderKind::Header);
        assert!(!config.reject_private_ips);

        let ctx = cli.request_context().unwrap();
        assert_eq!(ctx.header("cf-ipcountry"), Some("FR"));
        assert_eq!(ctx.header("cf-ipcity"), Some("Saint-Denis=93"));
    }

    #[test]
    fn test_requires_an_ip() {
        assert!(Cli::try_parse_from(["geolocator"]).is_err());
    }

    #[test]
    fn test_rejects_malformed_header() {
        let cli = Cli::try_parse_from(["geolocator", "-H", "cf-ipcountry", "1.1.1.1"]).unwrap();
        assert!(cli.request_context().is_err());

        let cli = Cli::try_parse_from(["geolocator", "-H", "=FR", "1.1.1.1"]).unwrap();
        assert!(cli.request_context().is_err());
    }

    #[test]
    fn test_summary() {
        let details = LocationDetails {
            region: Some("Île-de-France".to_string()),
            ..Default::default()
        };
        let location = LocationResult::new("FR", "France", "Paris", details);
        assert_eq!(summary(&location), "🇫🇷 France (FR), Île-de-France, Paris");

        assert_eq!(
            summary(&LocationResult::unknown()),
            format!("{} Unknown, Unknown", geolocator::location::UNKNOWN_FLAG)
        );
    }
}
