//! # MAVLink Module
//!
//! Streaming MAVLink v1/v2 frame parsing, payload decoding, and encoding
//! of the few frames the bridge sends back to the flight controller.
//!
//! Only the message set needed for passthrough telemetry is decoded; frames
//! carrying anything else are CRC-checked and counted, then discarded.

pub mod crc;
pub mod encoder;
pub mod messages;
pub mod parser;

pub use encoder::MavEncoder;
pub use messages::MavMessage;
pub use parser::{LinkStats, MavlinkParser, RawFrame};
