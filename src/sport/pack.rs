//! # Passthrough Field Packers
//!
//! One encoder per outbound sensor ID. Each reads the aggregated vehicle
//! state, compresses the values into a 32-bit payload with the lossy
//! quantization the receiving display scripts expect, and pushes the result
//! into the sensor table.

use crate::config::CapacitySource;
use crate::telemetry::TelemetryState;

use super::protocol::{param_id, sensor};
use super::scheduler::SensorTable;

/// An encoded sensor value ready for framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackRequest {
    pub id: u16,
    pub sub_id: u8,
    pub payload: u32,
}

/// Accumulates bit fields into a 32-bit payload.
///
/// Values are masked to their field width. In debug builds, overlapping
/// fields panic.
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    bits: u32,
    used: u32,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, value: u32, offset: u32, width: u32) -> &mut Self {
        debug_assert!(offset + width <= 32);
        let mask = if width == 32 { u32::MAX } else { (1 << width) - 1 };
        debug_assert_eq!(
            self.used & (mask << offset),
            0,
            "field at offset {} width {} overlaps",
            offset,
            width
        );
        self.used |= mask << offset;
        self.bits |= (value & mask) << offset;
        self
    }

    pub fn finish(&self) -> u32 {
        self.bits
    }
}

/// Exponent/mantissa compression used across the passthrough payloads,
/// ported from the ArduPilot FrSky driver. `digits` mantissa digits and
/// `power` exponent bits; out-of-range values saturate at the largest
/// representable magnitude. The sign bit sits above the encoded value.
pub fn prep_number(number: i32, digits: u8, power: u8) -> u16 {
    let abs = number.unsigned_abs();
    let round = |x: u32, div: f32| (x as f32 * div).round() as u16;

    let mut res: u16 = match (digits, power) {
        (1, 1) => {
            if abs < 10 {
                (abs as u16) << 1
            } else if abs < 150 {
                (round(abs, 0.1) << 1) | 0x1
            } else {
                0x1f
            }
        }
        (2, 1) => {
            if abs < 100 {
                (abs as u16) << 1
            } else if abs < 1270 {
                (round(abs, 0.1) << 1) | 0x1
            } else {
                0xff
            }
        }
        (2, 2) => {
            if abs < 100 {
                (abs as u16) << 2
            } else if abs < 1000 {
                (round(abs, 0.1) << 2) | 0x1
            } else if abs < 10000 {
                (round(abs, 0.01) << 2) | 0x2
            } else if abs < 127_000 {
                (round(abs, 0.001) << 2) | 0x3
            } else {
                0x1ff
            }
        }
        (3, 1) => {
            if abs < 1000 {
                (abs as u16) << 1
            } else if abs < 10240 {
                (round(abs, 0.1) << 1) | 0x1
            } else {
                0x7ff
            }
        }
        (3, 2) => {
            if abs < 1000 {
                (abs as u16) << 2
            } else if abs < 10000 {
                (round(abs, 0.1) << 2) | 0x1
            } else if abs < 100_000 {
                (round(abs, 0.01) << 2) | 0x2
            } else if abs < 1_024_000 {
                (round(abs, 0.001) << 2) | 0x3
            } else {
                0xfff
            }
        }
        _ => unreachable!("unsupported prep_number layout"),
    };

    if number < 0 {
        // Sign bit position depends on the encoded width.
        let sign_shift = match (digits, power) {
            (1, 1) => 5,
            (2, 1) => 8,
            (2, 2) => 9,
            (3, 1) => 11,
            (3, 2) => 12,
            _ => unreachable!(),
        };
        res |= 1 << sign_shift;
    }
    res
}

/// Map a 1000-2000us PWM value onto a signed 6-bit magnitude.
pub fn pwm_to_63(pwm: u16) -> i8 {
    let scaled = ((f32::from(pwm) - 1500.0) * 0.126).round();
    scaled.clamp(-63.0, 63.0) as i8
}

/// Normalize an angle in degrees to [0, 360).
pub fn wrap_360(angle: f32) -> f32 {
    let res = angle % 360.0;
    if res < 0.0 {
        res + 360.0
    } else {
        res
    }
}

/// Add two bearings in degrees, correcting for the 360 boundary.
pub fn add_360(a: i32, b: i32) -> i32 {
    let mut ret = a + b;
    if ret < 0 {
        ret += 360;
    }
    if ret > 359 {
        ret -= 360;
    }
    ret
}

/// Great-circle distance in meters between two points given in degrees.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    EARTH_RADIUS_M * 2.0 * a.sqrt().asin()
}

/// Azimuth bearing in degrees [0, 360) from point 1 to point 2.
pub fn azimuth_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());
    let az = ((lon2 - lon1).sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos())
        .to_degrees();
    if az < 0.0 {
        az + 360.0
    } else {
        az
    }
}

/// The sensor encoders, with the little cross-call state some of them
/// need (the servo chunk cursor and the parameter rotation).
pub struct FieldPackers {
    servo_cursor: usize,
    param_cycle: u8,
    capacity_source: CapacitySource,
    local_bat1_capacity: u32,
    local_bat2_capacity: u32,
}

impl FieldPackers {
    pub fn new(
        capacity_source: CapacitySource,
        local_bat1_capacity: u32,
        local_bat2_capacity: u32,
    ) -> Self {
        Self {
            servo_cursor: 0,
            param_cycle: 0,
            capacity_source,
            local_bat1_capacity,
            local_bat2_capacity,
        }
    }

    /// Encode the named sensor from current state and enqueue it.
    pub fn pack(
        &mut self,
        id: u16,
        state: &mut TelemetryState,
        table: &mut SensorTable,
        now_ms: u64,
    ) {
        match id {
            sensor::GPS_LAT_LON => {
                if let Some((lat, lon)) = Self::lat_lon(state) {
                    table.push(lat, now_ms);
                    table.push(lon, now_ms);
                }
            }
            sensor::TEXT_MSG => {
                for request in Self::text_chunks(state) {
                    table.push(request, now_ms);
                }
            }
            sensor::AP_STATUS => table.push(Self::ap_status(state), now_ms),
            sensor::GPS_STATUS => table.push(Self::gps_status(state), now_ms),
            sensor::BATTERY_1 => table.push(Self::battery_1(state), now_ms),
            sensor::HOME => table.push(Self::home(state), now_ms),
            sensor::VEL_YAW => table.push(Self::vel_yaw(state), now_ms),
            sensor::ATTITUDE_RANGE => table.push(Self::attitude_range(state), now_ms),
            sensor::PARAMS => {
                if let Some(request) = self.next_param(state) {
                    table.push(request, now_ms);
                }
            }
            sensor::BATTERY_2 => table.push(Self::battery_2(state), now_ms),
            sensor::WAYPOINT => table.push(Self::waypoint(state), now_ms),
            sensor::SERVO_RAW => {
                if let Some(request) = self.servo_chunk(state) {
                    table.push(request, now_ms);
                }
            }
            sensor::HUD => table.push(Self::hud(state), now_ms),
            sensor::RSSI => table.push(Self::rssi(state), now_ms),
            _ => {}
        }
    }

    /// 0x800, two records: absolute degrees scaled to minutes * 10^4,
    /// hemisphere in the top selector bits. Skipped below a 3D fix.
    fn lat_lon(state: &TelemetryState) -> Option<(PackRequest, PackRequest)> {
        if state.fix_type < 3 {
            return None;
        }

        let encode = |coord_1e7: i32, selector_pos: u32, selector_neg: u32| {
            let value = coord_1e7.unsigned_abs() / 100 * 6;
            let selector = if coord_1e7 < 0 { selector_neg } else { selector_pos };
            PayloadBuilder::new()
                .put(value, 0, 30)
                .put(selector, 30, 2)
                .finish()
        };

        Some((
            PackRequest {
                id: sensor::GPS_LAT_LON,
                sub_id: 0,
                payload: encode(state.lat_1e7, 0, 1),
            },
            PackRequest {
                id: sensor::GPS_LAT_LON,
                sub_id: 1,
                payload: encode(state.lon_1e7, 2, 3),
            },
        ))
    }

    /// 0x5000, one record per 4-character chunk. Characters are 7 bits
    /// wide, big-endian within the word; the three severity bits ride on
    /// the spare top bits of the final chunk.
    fn text_chunks(state: &mut TelemetryState) -> Vec<PackRequest> {
        let Some(status) = state.status_text.take() else {
            return Vec::new();
        };

        let bytes = status.text.as_bytes();
        let chunk_count = bytes.len().div_ceil(4).max(1);

        (0..chunk_count)
            .map(|chunk| {
                let mut builder = PayloadBuilder::new();
                for i in 0..4 {
                    let ch = bytes.get(chunk * 4 + i).copied().unwrap_or(0);
                    builder.put(u32::from(ch), 24 - 8 * i as u32, 7);
                }
                if chunk == chunk_count - 1 {
                    let sev = u32::from(status.severity);
                    builder
                        .put(sev & 0x1, 7, 1)
                        .put(sev >> 1 & 0x1, 15, 1)
                        .put(sev >> 2 & 0x1, 23, 1);
                }
                PackRequest {
                    id: sensor::TEXT_MSG,
                    sub_id: (chunk + 1) as u8,
                    payload: builder.finish(),
                }
            })
            .collect()
    }

    /// 0x5001: flight mode, arming, and IMU temperature.
    fn ap_status(state: &TelemetryState) -> PackRequest {
        // Mode 0 means "no telemetry yet" to the display script.
        let flight_mode = state.custom_mode + 1;
        let armed = u32::from(state.armed);
        let imu_temp = state.imu_temp_c.clamp(0, 63) as u32;

        let payload = PayloadBuilder::new()
            .put(flight_mode, 0, 5)
            .put(0, 5, 2) // simple/super-simple flags, unused
            .put(armed, 7, 1) // landed flag follows arming
            .put(armed, 8, 1)
            .put(0, 9, 1) // battery failsafe, no MAVLink source
            .put(0, 10, 2) // EKF failsafe, no MAVLink source
            .put(imu_temp, 26, 6)
            .finish();

        PackRequest {
            id: sensor::AP_STATUS,
            sub_id: 0,
            payload,
        }
    }

    /// 0x5002: satellite count, fix quality, HDOP, GPS altitude.
    fn gps_status(state: &TelemetryState) -> PackRequest {
        let sats = u32::from(state.satellites_visible.min(15));
        let fix = u32::from(state.fix_type.min(3));
        let advanced_fix = u32::from(state.fix_type.saturating_sub(3).min(3));
        let hdop = prep_number(i32::from(state.eph / 10), 2, 1);
        let amsl_dm = state.gps_alt_amsl_mm / 100;
        let amsl = prep_number(amsl_dm, 2, 2);

        let payload = PayloadBuilder::new()
            .put(sats, 0, 4)
            .put(fix, 4, 2)
            .put(u32::from(hdop), 6, 8)
            .put(advanced_fix, 14, 2)
            .put(u32::from(amsl), 22, 9)
            .put(u32::from(amsl_dm < 0), 31, 1)
            .finish();

        PackRequest {
            id: sensor::GPS_STATUS,
            sub_id: 0,
            payload,
        }
    }

    fn battery_1(state: &TelemetryState) -> PackRequest {
        let mah = state
            .bat1_reported_mah
            .unwrap_or_else(|| state.bat1.consumed_mah());
        PackRequest {
            id: sensor::BATTERY_1,
            sub_id: 0,
            payload: Self::battery_payload(
                state.bat1.voltage_mv(),
                state.bat1.current_ca(),
                mah,
            ),
        }
    }

    fn battery_2(state: &TelemetryState) -> PackRequest {
        let mah = state
            .bat2_reported_mah
            .unwrap_or_else(|| state.bat2.consumed_mah());
        PackRequest {
            id: sensor::BATTERY_2,
            sub_id: 1,
            payload: Self::battery_payload(
                state.bat2.voltage_mv(),
                state.bat2.current_ca(),
                mah,
            ),
        }
    }

    /// Shared 0x5003/0x5008 layout: decivolts, deciamps, consumed mAh.
    fn battery_payload(voltage_mv: u16, current_ca: i16, mah: u32) -> u32 {
        let volts_dv = u32::from(voltage_mv / 100);
        let amps = prep_number((f32::from(current_ca) * 0.1).round() as i32, 2, 1);
        PayloadBuilder::new()
            .put(volts_dv, 0, 9)
            .put(u32::from(amps), 9, 8)
            .put(mah, 17, 15)
            .finish()
    }

    /// 0x5004: distance and direction from the craft back to home.
    fn home(state: &TelemetryState) -> PackRequest {
        let cur = state.position();

        let (dist_m, home_angle) = match state.home() {
            Some(home) => {
                let az = azimuth_deg(home.lat_deg, home.lon_deg, cur.lat_deg, cur.lon_deg);
                let dist = distance_m(home.lat_deg, home.lon_deg, cur.lat_deg, cur.lon_deg);
                (dist.round() as i32, add_360(az as i32, -180))
            }
            None => (0, 0),
        };
        let arrow = (home_angle as f32 * 0.3333) as u32;

        let alt_dm = state.alt_rel_mm / 100;

        let payload = PayloadBuilder::new()
            .put(u32::from(prep_number(dist_m, 3, 2)), 0, 12)
            .put(u32::from(prep_number(alt_dm, 3, 2)), 12, 12)
            .put(u32::from(alt_dm < 0), 24, 1)
            .put(arrow, 25, 7)
            .finish();

        PackRequest {
            id: sensor::HOME,
            sub_id: 0,
            payload,
        }
    }

    /// 0x5005: climb rate, ground speed, yaw.
    fn vel_yaw(state: &TelemetryState) -> PackRequest {
        let vy_dms = state.climb_ms * 10.0;
        let vx_dms = state.groundspeed_ms * 10.0;
        // Yaw in 0.2 degree units.
        let yaw = (f32::from(state.heading_deg) * 10.0 * 0.5) as u32;

        let payload = PayloadBuilder::new()
            .put(
                u32::from(prep_number(vy_dms.round() as i32, 2, 1)),
                0,
                8,
            )
            .put(u32::from(vy_dms < 0.0), 8, 1)
            .put(
                u32::from(prep_number(vx_dms.round() as i32, 2, 1)),
                9,
                8,
            )
            .put(yaw, 17, 11)
            .finish();

        PackRequest {
            id: sensor::VEL_YAW,
            sub_id: 0,
            payload,
        }
    }

    /// 0x5006: roll/pitch attitude plus rangefinder distance.
    fn attitude_range(state: &TelemetryState) -> PackRequest {
        // [-180,180] -> [0,1800] and [-90,90] -> [0,900], 0.2 deg units
        let roll = (state.roll_deg * 5.0 + 900.0).round().clamp(0.0, 1800.0) as u32;
        let pitch = (state.pitch_deg * 5.0 + 450.0).round().clamp(0.0, 900.0) as u32;
        let range_cm = (state.range_m * 100.0).round() as i32;

        let payload = PayloadBuilder::new()
            .put(roll, 0, 11)
            .put(pitch, 11, 10)
            .put(u32::from(prep_number(range_cm, 3, 1)), 21, 11)
            .finish();

        PackRequest {
            id: sensor::ATTITUDE_RANGE,
            sub_id: 0,
            payload,
        }
    }

    /// 0x5007, rotating through the four reported parameters.
    fn next_param(&mut self, state: &TelemetryState) -> Option<PackRequest> {
        self.param_cycle = self.param_cycle % 4 + 1;

        let (pid, sub_id, value) = match self.param_cycle {
            1 => (param_id::FRAME_TYPE, 1, u32::from(state.mav_type)),
            2 => (
                param_id::BATTERY_1_CAPACITY,
                4,
                match self.capacity_source {
                    CapacitySource::Fc => state.fc_bat1_capacity,
                    CapacitySource::Local => self.local_bat1_capacity,
                },
            ),
            3 => (
                param_id::BATTERY_2_CAPACITY,
                5,
                match self.capacity_source {
                    CapacitySource::Fc => state.fc_bat2_capacity,
                    CapacitySource::Local => self.local_bat2_capacity,
                },
            ),
            4 => (param_id::MISSION_COUNT, 6, u32::from(state.mission_count)),
            _ => return None,
        };

        let payload = PayloadBuilder::new()
            .put(value, 0, 24)
            .put(u32::from(pid), 24, 4)
            .finish();

        Some(PackRequest {
            id: sensor::PARAMS,
            sub_id,
            payload,
        })
    }

    /// 0x5009: active waypoint progress, with the bearing-to-waypoint
    /// quantized to one of eight arrow directions relative to the track.
    fn waypoint(state: &TelemetryState) -> PackRequest {
        let cog_deg = f32::from(state.cog_cdeg) * 0.01;
        let angle = wrap_360(f32::from(state.target_bearing_deg) - cog_deg) as i32;
        let arrow = (((angle + 22) / 45) % 8) as u32;

        let payload = PayloadBuilder::new()
            .put(u32::from(state.mission_seq), 0, 10)
            .put(u32::from(prep_number(i32::from(state.wp_dist_m), 3, 2)), 10, 12)
            .put(
                u32::from(prep_number(state.xtrack_error_m.round() as i32, 1, 1)),
                22,
                6,
            )
            .put(arrow, 29, 3)
            .finish();

        PackRequest {
            id: sensor::WAYPOINT,
            sub_id: 1,
            payload,
        }
    }

    /// 0x50F1: four servo outputs per record as signed 6-bit magnitudes.
    /// The cursor walks the bank in chunks; after the last chunk one call
    /// is spent resetting, emitting nothing.
    fn servo_chunk(&mut self, state: &TelemetryState) -> Option<PackRequest> {
        if self.servo_cursor + 4 > state.servo_pwm.len() {
            self.servo_cursor = 0;
            return None;
        }

        let chunk = (self.servo_cursor / 4) as u32;
        let mut builder = PayloadBuilder::new();
        builder.put(chunk, 0, 4);
        for i in 0..4 {
            let value = pwm_to_63(state.servo_pwm[self.servo_cursor + i]);
            let base = 4 + 7 * i as u32;
            builder.put(value.unsigned_abs().into(), base, 6);
            builder.put(u32::from(value < 0), base + 6, 1);
        }
        self.servo_cursor += 4;

        Some(PackRequest {
            id: sensor::SERVO_RAW,
            sub_id: 1,
            payload: builder.finish(),
        })
    }

    /// 0x50F2: airspeed, throttle, barometric altitude.
    fn hud(state: &TelemetryState) -> PackRequest {
        let airspeed_dms = (state.airspeed_ms * 10.0).round() as i32;
        let alt_dm = (state.baro_alt_m * 10.0).round() as i32;

        let payload = PayloadBuilder::new()
            .put(u32::from(prep_number(airspeed_dms, 2, 1)), 0, 8)
            .put(u32::from(state.throttle_pct), 8, 7)
            .put(u32::from(prep_number(alt_dm, 3, 2)), 15, 12)
            .put(u32::from(alt_dm < 0), 27, 1)
            .finish();

        PackRequest {
            id: sensor::HUD,
            sub_id: 1,
            payload,
        }
    }

    /// 0xF101: link quality for the radio's "telemetry lost" detection.
    /// Before a real reading arrives, report full strength rather than
    /// triggering a spurious loss announcement; zero is floored for the
    /// same reason.
    fn rssi(state: &TelemetryState) -> PackRequest {
        let mut value = if state.rssi_good {
            state.rssi_percent as u32
        } else {
            254
        };
        if value < 1 {
            value = 69;
        }

        PackRequest {
            id: sensor::RSSI,
            sub_id: 1,
            payload: PayloadBuilder::new().put(value, 0, 32).finish(),
        }
    }
}
