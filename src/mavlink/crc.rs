//! # MAVLink CRC
//!
//! CRC-16/MCRF4XX (X.25) as used by the MAVLink wire protocol, plus the
//! per-message CRC_EXTRA seed table for the decoded message set.

/// Accumulate a single byte into a running CRC-16/MCRF4XX value.
pub fn crc_accumulate(byte: u8, crc: u16) -> u16 {
    let mut tmp = (byte ^ (crc & 0xff) as u8) as u16;
    tmp ^= (tmp << 4) & 0xff;
    (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
}

/// Compute CRC-16/MCRF4XX over a byte slice (init 0xFFFF).
pub fn crc_calculate(data: &[u8]) -> u16 {
    data.iter().fold(0xffff, |crc, &b| crc_accumulate(b, crc))
}

/// Per-message CRC_EXTRA seed, or `None` for unknown message IDs.
///
/// Unknown IDs cannot be CRC-verified, so the parser drops those frames
/// without counting them as corrupt.
pub fn crc_extra(msg_id: u32) -> Option<u8> {
    match msg_id {
        0 => Some(50),    // HEARTBEAT
        1 => Some(124),   // SYS_STATUS
        2 => Some(137),   // SYSTEM_TIME
        22 => Some(220),  // PARAM_VALUE
        24 => Some(24),   // GPS_RAW_INT
        26 => Some(170),  // SCALED_IMU
        30 => Some(39),   // ATTITUDE
        33 => Some(104),  // GLOBAL_POSITION_INT
        35 => Some(244),  // RC_CHANNELS_RAW
        36 => Some(222),  // SERVO_OUTPUT_RAW
        42 => Some(28),   // MISSION_CURRENT
        44 => Some(221),  // MISSION_COUNT
        62 => Some(183),  // NAV_CONTROLLER_OUTPUT
        65 => Some(118),  // RC_CHANNELS
        74 => Some(20),   // VFR_HUD
        109 => Some(185), // RADIO_STATUS
        147 => Some(154), // BATTERY_STATUS
        173 => Some(83),  // RANGEFINDER
        181 => Some(174), // BATTERY2
        226 => Some(207), // RPM
        253 => Some(83),  // STATUSTEXT
        _ => None,
    }
}
