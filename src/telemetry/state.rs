//! # Vehicle Telemetry State
//!
//! Single aggregation point for everything the passthrough encoders read.
//! Each decoded MAVLink message updates the relevant fields and nominates
//! the sensor IDs whose payloads should be re-encoded as a result.

use tracing::{debug, info, warn};

use super::battery::{cell_count, BatteryMonitor};
use crate::mavlink::MavMessage;
use crate::sport::protocol::sensor;

/// MAV_TYPE values whose heartbeats are not from the flight controller.
/// 5 = antenna tracker, 6 = GCS, 27 = ADSB peripheral.
const IGNORED_HEARTBEAT_TYPES: [u8; 3] = [5, 6, 27];

/// Minimum interval between synthesized sensor-health warnings.
const HEALTH_REPORT_INTERVAL_MS: u64 = 5000;

/// A status text awaiting chunked transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusText {
    pub severity: u8,
    pub text: String,
}

/// Geographic position snapshot used for the home-direction math.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f32,
    pub hdg_deg: f32,
}

/// Aggregated vehicle state.
///
/// Time is injected as `now_ms`, a monotonic millisecond count, so the
/// connection hysteresis and rate limiting are testable without a clock.
pub struct TelemetryState {
    // link supervision
    connected: bool,
    hb_count: u8,
    last_heartbeat_ms: u64,
    heartbeats_to_connect: u8,
    mav_timeout_ms: u64,

    // heartbeat
    pub mav_type: u8,
    pub custom_mode: u32,
    pub armed: bool,

    // GPS_RAW_INT
    pub fix_type: u8,
    pub satellites_visible: u8,
    pub eph: u16,
    pub gps_alt_amsl_mm: i32,
    pub cog_cdeg: u16,

    // GLOBAL_POSITION_INT
    pub lat_1e7: i32,
    pub lon_1e7: i32,
    pub alt_rel_mm: i32,

    cur: GeoPoint,
    home: Option<GeoPoint>,

    // ATTITUDE, degrees
    pub roll_deg: f32,
    pub pitch_deg: f32,

    // VFR_HUD
    pub airspeed_ms: f32,
    pub groundspeed_ms: f32,
    pub baro_alt_m: f32,
    pub climb_ms: f32,
    pub heading_deg: i16,
    pub throttle_pct: u16,

    // RANGEFINDER
    pub range_m: f32,

    // SCALED_IMU, whole degrees C
    pub imu_temp_c: i16,

    // mission and nav controller
    pub mission_seq: u16,
    pub mission_count: u16,
    pub xtrack_error_m: f32,
    pub target_bearing_deg: i16,
    pub wp_dist_m: u16,

    // batteries
    pub bat1: BatteryMonitor,
    pub bat2: BatteryMonitor,
    pub bat1_cells: u8,
    pub bat2_cells: u8,
    /// Consumed capacity reported by BATTERY_STATUS, when the FC sends it
    pub bat1_reported_mah: Option<u32>,
    pub bat2_reported_mah: Option<u32>,
    /// Pack capacities from PARAM_VALUE
    pub fc_bat1_capacity: u32,
    pub fc_bat2_capacity: u32,

    // SERVO_OUTPUT_RAW
    pub servo_pwm: [u16; 8],

    /// Latest status text, consumed by the text encoder
    pub status_text: Option<StatusText>,

    // RSSI sourcing. A higher-quality source, once seen, permanently
    // outranks the lower ones.
    seen_rc_raw: bool,
    seen_rc_channels: bool,
    seen_radio_status: bool,
    pub rssi_percent: f32,
    pub rssi_good: bool,

    // synthesized health warnings
    sensor_health: u32,
    last_health_report_ms: u64,
}

impl TelemetryState {
    pub fn new(heartbeats_to_connect: u8, mav_timeout_ms: u64) -> Self {
        Self {
            connected: false,
            hb_count: 0,
            last_heartbeat_ms: 0,
            heartbeats_to_connect,
            mav_timeout_ms,
            mav_type: 0,
            custom_mode: 0,
            armed: false,
            fix_type: 0,
            satellites_visible: 0,
            eph: 0,
            gps_alt_amsl_mm: 0,
            cog_cdeg: 0,
            lat_1e7: 0,
            lon_1e7: 0,
            alt_rel_mm: 0,
            cur: GeoPoint::default(),
            home: None,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            airspeed_ms: 0.0,
            groundspeed_ms: 0.0,
            baro_alt_m: 0.0,
            climb_ms: 0.0,
            heading_deg: 0,
            throttle_pct: 0,
            range_m: 0.0,
            imu_temp_c: 0,
            mission_seq: 0,
            mission_count: 0,
            xtrack_error_m: 0.0,
            target_bearing_deg: 0,
            wp_dist_m: 0,
            bat1: BatteryMonitor::new(),
            bat2: BatteryMonitor::new(),
            bat1_cells: 0,
            bat2_cells: 0,
            bat1_reported_mah: None,
            bat2_reported_mah: None,
            fc_bat1_capacity: 0,
            fc_bat2_capacity: 0,
            servo_pwm: [0; 8],
            status_text: None,
            seen_rc_raw: false,
            seen_rc_channels: false,
            seen_radio_status: false,
            rssi_percent: 0.0,
            rssi_good: false,
            sensor_health: 0,
            last_health_report_ms: 0,
        }
    }

    /// Whether the MAVLink side is considered up.
    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn home(&self) -> Option<GeoPoint> {
        self.home
    }

    pub fn position(&self) -> GeoPoint {
        self.cur
    }

    /// Apply one decoded message; returns the sensor IDs to re-encode.
    ///
    /// While disconnected, only heartbeats (to re-establish the link) and
    /// status texts are processed.
    pub fn handle_message(&mut self, msg: &MavMessage, now_ms: u64) -> Vec<u16> {
        if !self.connected
            && !matches!(msg, MavMessage::Heartbeat { .. } | MavMessage::Statustext { .. })
        {
            return Vec::new();
        }

        match msg {
            MavMessage::Heartbeat {
                custom_mode,
                mav_type,
                base_mode,
                ..
            } => self.on_heartbeat(*custom_mode, *mav_type, *base_mode, now_ms),

            MavMessage::SysStatus {
                sensor_health,
                voltage_battery_mv,
                current_battery_ca,
            } => {
                self.sensor_health = *sensor_health;
                let mv = self.bat1.update_voltage(*voltage_battery_mv);
                self.bat1.update_current(*current_battery_ca, now_ms);
                self.bat1_cells = cell_count(mv, self.bat1_cells);

                let mut ids = vec![sensor::BATTERY_1];
                if self.synthesize_health_warning(now_ms) {
                    ids.push(sensor::TEXT_MSG);
                }
                ids
            }

            MavMessage::SystemTime { time_unix_usec, .. } => {
                debug!(unix_usec = time_unix_usec, "flight controller time");
                Vec::new()
            }

            MavMessage::ParamValue {
                param_value,
                param_id,
                ..
            } => {
                match param_id.as_str() {
                    "BATT_CAPACITY" => self.fc_bat1_capacity = *param_value as u32,
                    "BATT2_CAPACITY" => self.fc_bat2_capacity = *param_value as u32,
                    _ => {}
                }
                Vec::new()
            }

            MavMessage::GpsRawInt {
                lat,
                lon,
                alt_mm,
                eph,
                cog_cdeg,
                fix_type,
                satellites_visible,
                ..
            } => {
                self.fix_type = *fix_type;
                self.satellites_visible = *satellites_visible;
                if *fix_type > 2 {
                    self.eph = *eph;
                    self.gps_alt_amsl_mm = *alt_mm;
                    self.cog_cdeg = *cog_cdeg;
                    self.cur.lat_deg = f64::from(*lat) / 1e7;
                    self.cur.lon_deg = f64::from(*lon) / 1e7;
                    self.cur.alt_m = *alt_mm as f32 / 1e3;
                }
                vec![sensor::GPS_LAT_LON, sensor::GPS_STATUS, sensor::HOME]
            }

            MavMessage::ScaledImu { temperature_cdeg } => {
                self.imu_temp_c = temperature_cdeg / 100;
                Vec::new()
            }

            MavMessage::Attitude {
                roll_rad,
                pitch_rad,
                ..
            } => {
                self.roll_deg = roll_rad.to_degrees();
                self.pitch_deg = pitch_rad.to_degrees();
                vec![sensor::ATTITUDE_RANGE]
            }

            MavMessage::GlobalPositionInt {
                lat,
                lon,
                alt_mm,
                relative_alt_mm,
                hdg_cdeg,
                ..
            } => {
                if self.fix_type < 3 {
                    return Vec::new();
                }
                self.lat_1e7 = *lat;
                self.lon_1e7 = *lon;
                self.alt_rel_mm = *relative_alt_mm;
                self.cur.lat_deg = f64::from(*lat) / 1e7;
                self.cur.lon_deg = f64::from(*lon) / 1e7;
                self.cur.alt_m = *alt_mm as f32 / 1e3;
                self.cur.hdg_deg = f32::from(*hdg_cdeg) / 100.0;
                Vec::new()
            }

            MavMessage::RcChannelsRaw { rssi } => {
                self.seen_rc_raw = true;
                if !self.seen_rc_channels && !self.seen_radio_status {
                    self.set_rssi(*rssi);
                }
                Vec::new()
            }

            MavMessage::RcChannels { rssi } => {
                self.seen_rc_channels = true;
                if !self.seen_radio_status {
                    self.set_rssi(*rssi);
                }
                Vec::new()
            }

            MavMessage::RadioStatus { rssi } => {
                self.seen_radio_status = true;
                self.set_rssi(*rssi);
                Vec::new()
            }

            MavMessage::ServoOutputRaw { servo_raw } => {
                self.servo_pwm = *servo_raw;
                vec![sensor::SERVO_RAW]
            }

            MavMessage::MissionCurrent { seq } => {
                self.mission_seq = *seq;
                Vec::new()
            }

            MavMessage::MissionCount { count } => {
                self.mission_count = *count;
                Vec::new()
            }

            MavMessage::NavControllerOutput {
                xtrack_error_m,
                target_bearing_deg,
                wp_dist_m,
            } => {
                self.xtrack_error_m = *xtrack_error_m;
                self.target_bearing_deg = *target_bearing_deg;
                self.wp_dist_m = *wp_dist_m;
                vec![sensor::WAYPOINT]
            }

            MavMessage::VfrHud {
                airspeed_ms,
                groundspeed_ms,
                alt_m,
                climb_ms,
                heading_deg,
                throttle_pct,
            } => {
                self.airspeed_ms = *airspeed_ms;
                self.groundspeed_ms = *groundspeed_ms;
                self.baro_alt_m = *alt_m;
                self.climb_ms = *climb_ms;
                self.heading_deg = *heading_deg;
                self.throttle_pct = *throttle_pct;
                self.cur.hdg_deg = f32::from(*heading_deg);
                vec![sensor::VEL_YAW, sensor::HUD]
            }

            MavMessage::BatteryStatus {
                current_consumed_mah,
                id,
            } => {
                let mah = (*current_consumed_mah).max(0) as u32;
                match id {
                    0 => self.bat1_reported_mah = Some(mah),
                    1 => self.bat2_reported_mah = Some(mah),
                    _ => {}
                }
                Vec::new()
            }

            MavMessage::Rangefinder { distance_m } => {
                self.range_m = *distance_m;
                vec![sensor::ATTITUDE_RANGE]
            }

            MavMessage::Battery2 {
                voltage_mv,
                current_battery_ca,
            } => {
                let mv = self.bat2.update_voltage(*voltage_mv);
                self.bat2.update_current(*current_battery_ca, now_ms);
                self.bat2_cells = cell_count(mv, self.bat2_cells);
                vec![sensor::BATTERY_2]
            }

            MavMessage::Rpm { rpm1, rpm2 } => {
                debug!(rpm1 = f64::from(*rpm1), rpm2 = f64::from(*rpm2), "engine rpm");
                Vec::new()
            }

            MavMessage::Statustext { severity, text } => {
                self.status_text = Some(StatusText {
                    severity: *severity,
                    text: text.clone(),
                });
                vec![sensor::TEXT_MSG]
            }
        }
    }

    /// Drop the link when heartbeats stop. Call regularly.
    pub fn check_timeout(&mut self, now_ms: u64) {
        if self.connected && now_ms.saturating_sub(self.last_heartbeat_ms) > self.mav_timeout_ms {
            self.connected = false;
            self.hb_count = 0;
            warn!("heartbeat timed out, flight controller link lost");
        }
    }

    fn on_heartbeat(
        &mut self,
        custom_mode: u32,
        mav_type: u8,
        base_mode: u8,
        now_ms: u64,
    ) -> Vec<u16> {
        if IGNORED_HEARTBEAT_TYPES.contains(&mav_type) {
            return Vec::new();
        }

        self.mav_type = mav_type;
        self.custom_mode = custom_mode;
        self.armed = base_mode & 0x80 != 0;
        self.last_heartbeat_ms = now_ms;

        if self.armed && self.home.is_none() {
            self.home = Some(self.cur);
            info!(
                lat = self.cur.lat_deg,
                lon = self.cur.lon_deg,
                alt = self.cur.alt_m,
                "armed for the first time, home position marked"
            );
        }

        if !self.connected {
            self.hb_count = self.hb_count.saturating_add(1);
            if self.hb_count >= self.heartbeats_to_connect {
                self.connected = true;
                info!("flight controller link established");
            }
        }

        vec![sensor::AP_STATUS]
    }

    fn set_rssi(&mut self, raw: u8) {
        self.rssi_percent = f32::from(raw) / 2.54;
        self.rssi_good = true;
    }

    /// Turn critical sensor-health bits into status texts, rate limited.
    /// First failed check wins; the rest wait for the next interval.
    fn synthesize_health_warning(&mut self, now_ms: u64) -> bool {
        const CHECKS: [(u8, &str); 12] = [
            (5, "Bad GPS Health"),
            (0, "Bad Gyro Health"),
            (1, "Bad Accel Health"),
            (2, "Bad Compass Health"),
            (3, "Bad Baro Health"),
            (8, "Bad LiDAR Health"),
            (6, "Bad OptFlow Health"),
            (22, "Bad or No Terrain Data"),
            (20, "Geofence Breach"),
            (21, "Bad AHRS"),
            (16, "No RC Receiver"),
            (24, "Bad Logging"),
        ];
        // MAV_SEVERITY_CRITICAL
        const SEVERITY: u8 = 2;

        if now_ms.saturating_sub(self.last_health_report_ms) <= HEALTH_REPORT_INTERVAL_MS {
            return false;
        }
        self.last_health_report_ms = now_ms;

        for (bit, text) in CHECKS {
            if self.sensor_health >> bit & 1 != 0 {
                self.status_text = Some(StatusText {
                    severity: SEVERITY,
                    text: text.to_string(),
                });
                return true;
            }
        }
        false
    }
}
