//! # MAVLink Frame Encoding
//!
//! Builds the two v1 frames the bridge sends up to the flight controller:
//! its own heartbeat (so telemetry radios keep the uplink alive) and
//! PARAM_REQUEST_READ for the battery capacity parameters.

use bytes::{BufMut, BytesMut};

use super::crc::{crc_accumulate, crc_calculate};
use super::parser::MAVLINK_V1_STX;

/// System ID the bridge claims on the uplink.
pub const BRIDGE_SYSTEM_ID: u8 = 20;
/// Component ID the bridge claims on the uplink.
pub const BRIDGE_COMPONENT_ID: u8 = 1;

// Heartbeat identity: MAV_TYPE_GCS / MAV_AUTOPILOT_ARDUPILOTMEGA /
// MAV_STATE_ACTIVE.
const MAV_TYPE_GCS: u8 = 6;
const MAV_AUTOPILOT_ARDUPILOTMEGA: u8 = 3;
const MAV_STATE_ACTIVE: u8 = 4;

const HEARTBEAT_MSG_ID: u8 = 0;
const HEARTBEAT_CRC_EXTRA: u8 = 50;
const PARAM_REQUEST_READ_MSG_ID: u8 = 20;
const PARAM_REQUEST_READ_CRC_EXTRA: u8 = 214;

/// Encoder for uplink frames, with its own outgoing sequence counter.
pub struct MavEncoder {
    sequence: u8,
}

impl MavEncoder {
    pub fn new() -> Self {
        Self { sequence: 0 }
    }

    /// The bridge's heartbeat, presenting itself as a ground station.
    pub fn heartbeat(&mut self) -> BytesMut {
        let mut payload = [0u8; 9];
        // custom_mode (u32 at 0) and base_mode (at 6) stay zero
        payload[4] = MAV_TYPE_GCS;
        payload[5] = MAV_AUTOPILOT_ARDUPILOTMEGA;
        payload[7] = MAV_STATE_ACTIVE;
        self.frame(HEARTBEAT_MSG_ID, HEARTBEAT_CRC_EXTRA, &payload)
    }

    /// PARAM_REQUEST_READ addressed by parameter name. The index field is
    /// -1, which tells the autopilot to look the name up instead.
    pub fn param_request_read(
        &mut self,
        target_system: u8,
        target_component: u8,
        name: &str,
    ) -> BytesMut {
        let mut payload = [0u8; 20];
        payload[..2].copy_from_slice(&(-1i16).to_le_bytes());
        payload[2] = target_system;
        payload[3] = target_component;
        let name = name.as_bytes();
        let len = name.len().min(16);
        payload[4..4 + len].copy_from_slice(&name[..len]);
        self.frame(
            PARAM_REQUEST_READ_MSG_ID,
            PARAM_REQUEST_READ_CRC_EXTRA,
            &payload,
        )
    }

    fn frame(&mut self, msg_id: u8, extra: u8, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(8 + payload.len());
        buf.put_u8(MAVLINK_V1_STX);
        buf.put_u8(payload.len() as u8);
        buf.put_u8(self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        buf.put_u8(BRIDGE_SYSTEM_ID);
        buf.put_u8(BRIDGE_COMPONENT_ID);
        buf.put_u8(msg_id);
        buf.put_slice(payload);
        let crc = crc_accumulate(extra, crc_calculate(&buf[1..]));
        buf.put_u16_le(crc);
        buf
    }
}

impl Default for MavEncoder {
    fn default() -> Self {
        Self::new()
    }
}
