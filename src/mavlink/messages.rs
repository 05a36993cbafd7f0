//! # MAVLink Message Decoding
//!
//! Typed views over the raw payloads of the messages the translator
//! consumes. Field offsets follow the MAVLink wire order (fields sorted by
//! size, little-endian). Payloads may arrive zero-truncated (v2), so every
//! read zero-extends past the end of the buffer.

use super::parser::RawFrame;

/// Zero-extending little-endian field reader.
struct Fields<'a>(&'a [u8]);

impl<'a> Fields<'a> {
    fn u8_at(&self, offset: usize) -> u8 {
        self.0.get(offset).copied().unwrap_or(0)
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from(self.u8_at(offset)) | u16::from(self.u8_at(offset + 1)) << 8
    }

    fn i16_at(&self, offset: usize) -> i16 {
        self.u16_at(offset) as i16
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from(self.u16_at(offset)) | u32::from(self.u16_at(offset + 2)) << 16
    }

    fn i32_at(&self, offset: usize) -> i32 {
        self.u32_at(offset) as i32
    }

    fn u64_at(&self, offset: usize) -> u64 {
        u64::from(self.u32_at(offset)) | u64::from(self.u32_at(offset + 4)) << 32
    }

    fn f32_at(&self, offset: usize) -> f32 {
        f32::from_bits(self.u32_at(offset))
    }

    /// NUL-terminated (or full-width) ASCII text field.
    fn text_at(&self, offset: usize, max_len: usize) -> String {
        let end = (offset + max_len).min(self.0.len());
        let raw = if offset < end { &self.0[offset..end] } else { &[] };
        let trimmed = raw.split(|&b| b == 0).next().unwrap_or(&[]);
        String::from_utf8_lossy(trimmed).into_owned()
    }
}

/// Decoded MAVLink messages, one variant per consumed message ID.
#[derive(Debug, Clone, PartialEq)]
pub enum MavMessage {
    /// #0
    Heartbeat {
        custom_mode: u32,
        mav_type: u8,
        autopilot: u8,
        base_mode: u8,
        system_status: u8,
    },
    /// #1
    SysStatus {
        sensor_health: u32,
        voltage_battery_mv: u16,
        current_battery_ca: i16,
    },
    /// #2
    SystemTime {
        time_unix_usec: u64,
        time_boot_ms: u32,
    },
    /// #22
    ParamValue {
        param_value: f32,
        param_count: u16,
        param_index: u16,
        param_id: String,
    },
    /// #24
    GpsRawInt {
        lat: i32,
        lon: i32,
        alt_mm: i32,
        eph: u16,
        vel_cms: u16,
        cog_cdeg: u16,
        fix_type: u8,
        satellites_visible: u8,
    },
    /// #26
    ScaledImu { temperature_cdeg: i16 },
    /// #30
    Attitude {
        roll_rad: f32,
        pitch_rad: f32,
        yaw_rad: f32,
    },
    /// #33
    GlobalPositionInt {
        lat: i32,
        lon: i32,
        alt_mm: i32,
        relative_alt_mm: i32,
        vx_cms: i16,
        vy_cms: i16,
        vz_cms: i16,
        hdg_cdeg: u16,
    },
    /// #35
    RcChannelsRaw { rssi: u8 },
    /// #36
    ServoOutputRaw { servo_raw: [u16; 8] },
    /// #42
    MissionCurrent { seq: u16 },
    /// #44
    MissionCount { count: u16 },
    /// #62
    NavControllerOutput {
        xtrack_error_m: f32,
        target_bearing_deg: i16,
        wp_dist_m: u16,
    },
    /// #65
    RcChannels { rssi: u8 },
    /// #74
    VfrHud {
        airspeed_ms: f32,
        groundspeed_ms: f32,
        alt_m: f32,
        climb_ms: f32,
        heading_deg: i16,
        throttle_pct: u16,
    },
    /// #109
    RadioStatus { rssi: u8 },
    /// #147
    BatteryStatus {
        current_consumed_mah: i32,
        id: u8,
    },
    /// #173
    Rangefinder { distance_m: f32 },
    /// #181
    Battery2 {
        voltage_mv: u16,
        current_battery_ca: i16,
    },
    /// #226
    Rpm { rpm1: f32, rpm2: f32 },
    /// #253
    Statustext { severity: u8, text: String },
}

impl MavMessage {
    /// Decode a verified frame; `None` for message IDs outside the set.
    pub fn decode(frame: &RawFrame) -> Option<Self> {
        let f = Fields(&frame.payload);
        let msg = match frame.msg_id {
            0 => MavMessage::Heartbeat {
                custom_mode: f.u32_at(0),
                mav_type: f.u8_at(4),
                autopilot: f.u8_at(5),
                base_mode: f.u8_at(6),
                system_status: f.u8_at(7),
            },
            1 => MavMessage::SysStatus {
                sensor_health: f.u32_at(8),
                voltage_battery_mv: f.u16_at(14),
                current_battery_ca: f.i16_at(16),
            },
            2 => MavMessage::SystemTime {
                time_unix_usec: f.u64_at(0),
                time_boot_ms: f.u32_at(8),
            },
            22 => MavMessage::ParamValue {
                param_value: f.f32_at(0),
                param_count: f.u16_at(4),
                param_index: f.u16_at(6),
                param_id: f.text_at(8, 16),
            },
            24 => MavMessage::GpsRawInt {
                lat: f.i32_at(8),
                lon: f.i32_at(12),
                alt_mm: f.i32_at(16),
                eph: f.u16_at(20),
                vel_cms: f.u16_at(24),
                cog_cdeg: f.u16_at(26),
                fix_type: f.u8_at(28),
                satellites_visible: f.u8_at(29),
            },
            26 => MavMessage::ScaledImu {
                temperature_cdeg: f.i16_at(22),
            },
            30 => MavMessage::Attitude {
                roll_rad: f.f32_at(4),
                pitch_rad: f.f32_at(8),
                yaw_rad: f.f32_at(12),
            },
            33 => MavMessage::GlobalPositionInt {
                lat: f.i32_at(4),
                lon: f.i32_at(8),
                alt_mm: f.i32_at(12),
                relative_alt_mm: f.i32_at(16),
                vx_cms: f.i16_at(20),
                vy_cms: f.i16_at(22),
                vz_cms: f.i16_at(24),
                hdg_cdeg: f.u16_at(26),
            },
            35 => MavMessage::RcChannelsRaw { rssi: f.u8_at(21) },
            36 => {
                let mut servo_raw = [0u16; 8];
                for (i, slot) in servo_raw.iter_mut().enumerate() {
                    *slot = f.u16_at(4 + i * 2);
                }
                MavMessage::ServoOutputRaw { servo_raw }
            }
            42 => MavMessage::MissionCurrent { seq: f.u16_at(0) },
            44 => MavMessage::MissionCount { count: f.u16_at(0) },
            62 => MavMessage::NavControllerOutput {
                xtrack_error_m: f.f32_at(16),
                target_bearing_deg: f.i16_at(22),
                wp_dist_m: f.u16_at(24),
            },
            65 => MavMessage::RcChannels { rssi: f.u8_at(41) },
            74 => MavMessage::VfrHud {
                airspeed_ms: f.f32_at(0),
                groundspeed_ms: f.f32_at(4),
                alt_m: f.f32_at(8),
                climb_ms: f.f32_at(12),
                heading_deg: f.i16_at(16),
                throttle_pct: f.u16_at(18),
            },
            109 => MavMessage::RadioStatus { rssi: f.u8_at(4) },
            147 => MavMessage::BatteryStatus {
                current_consumed_mah: f.i32_at(0),
                id: f.u8_at(32),
            },
            173 => MavMessage::Rangefinder {
                distance_m: f.f32_at(0),
            },
            181 => MavMessage::Battery2 {
                voltage_mv: f.u16_at(0),
                current_battery_ca: f.i16_at(2),
            },
            226 => MavMessage::Rpm {
                rpm1: f.f32_at(0),
                rpm2: f.f32_at(4),
            },
            253 => MavMessage::Statustext {
                severity: f.u8_at(0),
                text: f.text_at(1, 50),
            },
            _ => return None,
        };
        Some(msg)
    }
}
