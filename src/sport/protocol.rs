//! # S.Port Protocol Constants
//!
//! Sensor IDs and framing bytes for the FrSky passthrough protocol.

/// Start/poll marker on the S.Port bus
pub const START_STOP: u8 = 0x7E;
/// Byte-stuffing escape marker
pub const BYTE_STUFF: u8 = 0x7D;
/// XOR applied to a stuffed byte
pub const STUFF_MASK: u8 = 0x20;
/// Physical sensor slot polled for passthrough data (0x1B with ID bits)
pub const SENSOR_ID_28: u8 = 0x1B;
/// Data frame header byte
pub const DATA_FRAME: u8 = 0x10;

/// Passthrough sensor IDs
pub mod sensor {
    /// Text message chunks (STATUSTEXT)
    pub const TEXT_MSG: u16 = 0x5000;
    /// AP status: flight mode, arming, failsafes, IMU temperature
    pub const AP_STATUS: u16 = 0x5001;
    /// GPS status: satellite count, fix, HDOP, AMSL altitude
    pub const GPS_STATUS: u16 = 0x5002;
    /// Battery 1: volts, amps, consumed mAh
    pub const BATTERY_1: u16 = 0x5003;
    /// Home: distance, relative altitude, direction
    pub const HOME: u16 = 0x5004;
    /// Velocity and yaw
    pub const VEL_YAW: u16 = 0x5005;
    /// Attitude and rangefinder distance
    pub const ATTITUDE_RANGE: u16 = 0x5006;
    /// Parameter values (frame type, battery capacities, mission count)
    pub const PARAMS: u16 = 0x5007;
    /// Battery 2: volts, amps, consumed mAh
    pub const BATTERY_2: u16 = 0x5008;
    /// Active waypoint: sequence, distance, cross-track error, bearing
    pub const WAYPOINT: u16 = 0x5009;
    /// Servo outputs 1-8, chunked
    pub const SERVO_RAW: u16 = 0x50F1;
    /// HUD: airspeed, throttle, barometric altitude
    pub const HUD: u16 = 0x50F2;
    /// Legacy RSSI slot
    pub const RSSI: u16 = 0xF101;

    /// Latitude/longitude, shared FrSky GPS slot
    pub const GPS_LAT_LON: u16 = 0x800;
}

/// Parameter indices cycled through the 0x5007 frame
pub mod param_id {
    pub const FRAME_TYPE: u8 = 1;
    pub const BATTERY_1_CAPACITY: u8 = 4;
    pub const BATTERY_2_CAPACITY: u8 = 5;
    pub const MISSION_COUNT: u8 = 6;
}
