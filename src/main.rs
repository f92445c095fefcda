//! Main entry point for the geolocator CLI
//!
//! Resolves the addresses given on the command line with the configured
//! provider. Logging is controlled through `RUST_LOG`.

use clap::Parser;
use log::info;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    info!("Starting geolocator v{}", env!("CARGO_PKG_VERSION"));

    cli.run().await
}
