//! # mav2sport Library
//!
//! Translate MAVLink telemetry into FrSky S.Port passthrough frames.
//!
//! This library provides the core functionality for bridging an autopilot's
//! MAVLink telemetry stream onto the FrSky S.Port bus consumed by
//! passthrough-aware transmitter scripts.

pub mod config;
pub mod error;
pub mod mavlink;
pub mod telemetry;
pub mod sport;
pub mod bridge;
pub mod serial;
