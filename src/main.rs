//! # MAV Bridge
//!
//! Air-side MAVLink telemetry bridge for remote vehicles.
//!
//! Relays the flight controller's MAVLink stream between a serial link and
//! a ground station UDP peer, batching packets for a lossy radio link,
//! debouncing RC channel commands and injecting synthetic telemetry.

use anyhow::Result;
use tracing::info;

use mav_bridge::bridge::Bridge;
use mav_bridge::config::Config;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;

    // Initialize logging; verbose mode turns on per-packet dumps
    let base_level = if config.logging.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(base_level.into()),
        )
        .init();

    info!("MAV Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(config = %config_path, port = %config.serial.port, "listening on serial");

    let bridge = Bridge::new(&config).await?;
    bridge.run().await?;

    Ok(())
}
