//! # Telemetry State Module
//!
//! Aggregates decoded MAVLink messages into the vehicle picture the
//! passthrough encoders read from: link supervision, position, attitude,
//! batteries, mission progress, RSSI sourcing, and the home reference.

pub mod battery;
pub mod state;

pub use battery::BatteryMonitor;
pub use state::{StatusText, TelemetryState};
