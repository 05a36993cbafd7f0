//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Operating role of the translator.
///
/// The role is fixed at configuration time and selects how outbound frames
/// are scheduled:
///
/// - `Ground`: the translator sits next to the transmitter and originates
///   every frame on a fixed timer, start marker included (simplex link).
/// - `Air`: the translator shares the S.Port bus with an FrSky receiver and
///   only transmits when it observes the receiver polling the passthrough
///   sensor slot (half-duplex). RSSI is supplied by the receiver itself.
/// - `Relay`: like `Air` on the wire, but RSSI is self-sourced from the
///   MAVLink side as on the ground.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ground,
    Air,
    Relay,
}

impl Role {
    /// Whether this role transmits only in response to observed polling.
    pub fn is_poll_driven(self) -> bool {
        matches!(self, Role::Air | Role::Relay)
    }

    /// Whether this role must source RSSI from the MAVLink stream.
    pub fn self_sources_rssi(self) -> bool {
        matches!(self, Role::Ground | Role::Relay)
    }
}

/// Where battery pack capacities come from for the 0x5007 parameter frames.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CapacitySource {
    /// Read from the flight controller's PARAM_VALUE messages.
    Fc,
    /// Use the locally configured `bat1_capacity_mah` / `bat2_capacity_mah`.
    Local,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub mavlink: MavlinkSerialConfig,
    pub sport: SportSerialConfig,
    pub battery: BatteryConfig,
    pub timing: TimingConfig,
}

/// Role and link supervision settings
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub role: Role,

    /// Milliseconds without a heartbeat before the MAVLink link is declared down
    #[serde(default = "default_mav_timeout_ms")]
    pub mav_timeout_ms: u64,

    /// Consecutive heartbeats required before the link is declared up
    #[serde(default = "default_heartbeats_to_connect")]
    pub heartbeats_to_connect: u8,

    /// Milliseconds without seeing the receiver's poll sequence before the
    /// S.Port link is flagged degraded (air/relay roles only)
    #[serde(default = "default_sport_timeout_ms")]
    pub sport_timeout_ms: u64,
}

/// MAVLink (uplink) serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MavlinkSerialConfig {
    #[serde(default = "default_mavlink_port")]
    pub port: String,

    #[serde(default = "default_mavlink_baud")]
    pub baud_rate: u32,
}

/// S.Port (downlink) serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SportSerialConfig {
    #[serde(default = "default_sport_port")]
    pub port: String,

    #[serde(default = "default_sport_baud")]
    pub baud_rate: u32,
}

/// Battery capacity reporting configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    #[serde(default = "default_capacity_source")]
    pub capacity_source: CapacitySource,

    #[serde(default)]
    pub bat1_capacity_mah: u32,

    #[serde(default)]
    pub bat2_capacity_mah: u32,
}

/// Scheduler timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Injection tick for the ground role, in milliseconds
    #[serde(default = "default_inject_interval_ms")]
    pub inject_interval_ms: u64,

    /// RSSI (0xF101) refresh interval in milliseconds
    #[serde(default = "default_rssi_interval_ms")]
    pub rssi_interval_ms: u64,

    /// Parameter (0x5007) refresh interval in milliseconds
    #[serde(default = "default_param_interval_ms")]
    pub param_interval_ms: u64,
}

// Default value functions
fn default_mav_timeout_ms() -> u64 { 6000 }
fn default_heartbeats_to_connect() -> u8 { 3 }
fn default_sport_timeout_ms() -> u64 { 5000 }

fn default_mavlink_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_mavlink_baud() -> u32 { 57600 }

fn default_sport_port() -> String { "/dev/ttyUSB1".to_string() }
fn default_sport_baud() -> u32 { 57600 }

fn default_capacity_source() -> CapacitySource { CapacitySource::Fc }

fn default_inject_interval_ms() -> u64 { 10 }
fn default_rssi_interval_ms() -> u64 { 350 }
fn default_param_interval_ms() -> u64 { 5000 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.mavlink.port.is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("mavlink port cannot be empty")
            ));
        }

        if self.sport.port.is_empty() {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("sport port cannot be empty")
            ));
        }

        if self.general.mav_timeout_ms < 1000 || self.general.mav_timeout_ms > 60000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("mav_timeout_ms must be between 1000 and 60000")
            ));
        }

        if self.general.heartbeats_to_connect == 0 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("heartbeats_to_connect must be greater than 0")
            ));
        }

        if self.general.sport_timeout_ms < 500 || self.general.sport_timeout_ms > 60000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("sport_timeout_ms must be between 500 and 60000")
            ));
        }

        // The S.Port polling cycle is 12ms; injecting slower than one slot
        // per cycle starves the sensor table.
        if self.timing.inject_interval_ms == 0 || self.timing.inject_interval_ms > 12 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("inject_interval_ms must be between 1 and 12")
            ));
        }

        if self.timing.rssi_interval_ms < 100 || self.timing.rssi_interval_ms > 10000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("rssi_interval_ms must be between 100 and 10000")
            ));
        }

        if self.timing.param_interval_ms < 1000 || self.timing.param_interval_ms > 60000 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("param_interval_ms must be between 1000 and 60000")
            ));
        }

        if self.battery.capacity_source == CapacitySource::Local
            && self.battery.bat1_capacity_mah == 0 {
            return Err(crate::error::BridgeError::Config(
                toml::de::Error::custom("bat1_capacity_mah required when capacity_source is local")
            ));
        }

        Ok(())
    }
}
