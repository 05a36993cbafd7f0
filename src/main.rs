//! # mav2sport
//!
//! Translate MAVLink telemetry onto the FrSky S.Port bus as passthrough
//! sensor frames, so transmitter display scripts can show flight mode,
//! GPS, battery, and status text from an autopilot that speaks MAVLink.

use anyhow::Result;
use tracing::info;

use mav2sport::bridge;
use mav2sport::config::Config;
use mav2sport::serial;

/// Configuration file used when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "mav2sport.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("mav2sport v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!(
        path = %config_path,
        role = ?config.general.role,
        "configuration loaded"
    );

    let mavlink_port = serial::open(&config.mavlink.port, config.mavlink.baud_rate)?;
    let sport_port = serial::open(&config.sport.port, config.sport.baud_rate)?;

    bridge::run(&config, mavlink_port, sport_port).await?;

    Ok(())
}
