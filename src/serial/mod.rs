//! # Serial Communication Module
//!
//! Opens the two UARTs the bridge sits between: the MAVLink uplink from
//! the flight controller or telemetry radio, and the S.Port downlink to
//! the FrSky receiver or transmitter module. Both run 8N1 with no flow
//! control.

use crate::error::{BridgeError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

pub mod port_trait;

pub use port_trait::{SerialIO, TokioSerialPort};

/// Open a serial port with telemetry settings (8N1, no flow control).
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyUSB0")
/// * `baud_rate` - Line rate, typically 57600 for both links
///
/// # Errors
///
/// Returns `SerialPortNotFound` if the device does not exist, `Serial`
/// for any other open failure.
pub fn open(path: &str, baud_rate: u32) -> Result<TokioSerialPort> {
    debug!("Opening serial port {} at {} baud", path, baud_rate);

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice => BridgeError::SerialPortNotFound(path.to_string()),
            _ => BridgeError::Serial(format!("Failed to open {}: {}", path, e)),
        })?;

    info!("Opened serial port {} at {} baud", path, baud_rate);
    Ok(TokioSerialPort::new(port))
}
