//! # Bridge Orchestration
//!
//! Wires the MAVLink parser, telemetry state, packers, scheduler, and wire
//! framer together, and runs the role-specific transmit discipline:
//!
//! - `ground`: no receiver on the bus, so the bridge polls itself on a
//!   fixed injection tick and prepends the poll sequence to every frame.
//! - `air` / `relay`: the receiver owns the bus; the bridge answers its
//!   poll sequence and transmits nothing unsolicited.
//!
//! The bridge also talks back to the flight controller: its own heartbeat
//! every two seconds, and parameter reads for the battery capacities when
//! those are FC-sourced.

use bytes::BytesMut;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{CapacitySource, Config, Role};
use crate::error::{BridgeError, Result};
use crate::mavlink::{LinkStats, MavEncoder, MavMessage, MavlinkParser};
use crate::serial::SerialIO;
use crate::sport::framer::{encode_frame, POLL_SEQUENCE};
use crate::sport::pack::{FieldPackers, PackRequest};
use crate::sport::protocol::{sensor, SENSOR_ID_28, START_STOP};
use crate::sport::SensorTable;
use crate::telemetry::TelemetryState;

/// Interval between link statistics log lines.
const STATS_LOG_INTERVAL_SECS: u64 = 30;

/// Interval between the bridge's own heartbeats to the flight controller.
const FC_HEARTBEAT_INTERVAL_MS: u64 = 2000;

/// Re-request interval for unanswered battery capacity parameter reads.
const CAPACITY_REQUEST_INTERVAL_MS: u64 = 5000;

/// Parameter frames sent back-to-back when the downlink first comes up,
/// so the display script learns the frame type without waiting a full
/// refresh interval.
const PARAM_STARTUP_BURST: u32 = 3;

/// Core bridge state machine. Time is injected as a monotonic millisecond
/// count so role behavior is testable without a clock or serial hardware.
pub struct Bridge {
    role: Role,
    parser: MavlinkParser,
    state: TelemetryState,
    table: SensorTable,
    packers: FieldPackers,

    // uplink to the flight controller
    encoder: MavEncoder,
    capacity_source: CapacitySource,
    fc_system_id: u8,
    fc_component_id: u8,
    last_fc_heartbeat_ms: u64,
    last_capacity_request_ms: Option<u64>,

    rssi_interval_ms: u64,
    param_interval_ms: u64,
    sport_timeout_ms: u64,

    // poll detection across read boundaries
    prev_sport_byte: u8,
    last_poll_ms: u64,
    sport_good: bool,

    last_rssi_ms: u64,
    last_param_ms: u64,
    params_sent: u32,
}

impl Bridge {
    pub fn new(config: &Config) -> Self {
        Self {
            role: config.general.role,
            parser: MavlinkParser::new(),
            state: TelemetryState::new(
                config.general.heartbeats_to_connect,
                config.general.mav_timeout_ms,
            ),
            table: SensorTable::new(),
            packers: FieldPackers::new(
                config.battery.capacity_source,
                config.battery.bat1_capacity_mah,
                config.battery.bat2_capacity_mah,
            ),
            encoder: MavEncoder::new(),
            capacity_source: config.battery.capacity_source,
            // ArduPilot default address, replaced by the heartbeat sender
            fc_system_id: 1,
            fc_component_id: 1,
            last_fc_heartbeat_ms: 0,
            last_capacity_request_ms: None,
            rssi_interval_ms: config.timing.rssi_interval_ms,
            param_interval_ms: config.timing.param_interval_ms,
            sport_timeout_ms: config.general.sport_timeout_ms,
            prev_sport_byte: 0,
            last_poll_ms: 0,
            sport_good: false,
            last_rssi_ms: 0,
            last_param_ms: 0,
            params_sent: 0,
        }
    }

    pub fn stats(&self) -> &LinkStats {
        self.parser.stats()
    }

    /// Records dropped because the sensor table was full.
    pub fn dropped(&self) -> u64 {
        self.table.dropped()
    }

    /// Whether the S.Port side has been polled recently (air/relay only).
    pub fn sport_good(&self) -> bool {
        self.sport_good
    }

    /// Feed bytes from the MAVLink uplink. Completed frames update the
    /// telemetry state and re-encode the affected sensors.
    pub fn handle_mavlink(&mut self, bytes: &[u8], now_ms: u64) {
        for &byte in bytes {
            let Some(frame) = self.parser.push_byte(byte) else {
                continue;
            };
            let Some(msg) = MavMessage::decode(&frame) else {
                continue;
            };
            let from_heartbeat = matches!(msg, MavMessage::Heartbeat { .. });
            let ids = self.state.handle_message(&msg, now_ms);
            // A heartbeat the state accepted came from the flight
            // controller; its address becomes the parameter read target.
            if from_heartbeat && !ids.is_empty() {
                self.fc_system_id = frame.system_id;
                self.fc_component_id = frame.component_id;
            }
            for id in ids {
                self.packers
                    .pack(id, &mut self.state, &mut self.table, now_ms);
            }
        }
    }

    /// Frame a popped record for the wire. RSSI frames get an extra poll
    /// sequence ahead of them outside the relay role; the receiver side
    /// expects that announcement on the link-quality slot.
    fn frame_record(&self, request: &PackRequest) -> BytesMut {
        let frame = encode_frame(request, !self.role.is_poll_driven());
        if request.id == sensor::RSSI && self.role != Role::Relay {
            let mut announced = BytesMut::with_capacity(POLL_SEQUENCE.len() + frame.len());
            announced.extend_from_slice(&POLL_SEQUENCE);
            announced.extend_from_slice(&frame);
            return announced;
        }
        frame
    }

    /// Feed bytes observed on the S.Port bus (air/relay roles). Each poll
    /// of our sensor ID releases at most one pending frame, without the
    /// poll header since the receiver already provided it.
    pub fn handle_sport(&mut self, bytes: &[u8], now_ms: u64) -> Vec<BytesMut> {
        let mut out = Vec::new();
        for &byte in bytes {
            let polled = self.prev_sport_byte == START_STOP && byte == SENSOR_ID_28;
            self.prev_sport_byte = byte;
            if !polled {
                continue;
            }

            if !self.sport_good {
                info!("receiver polling detected, S.Port link up");
                self.sport_good = true;
            }
            self.last_poll_ms = now_ms;

            if !self.state.connected() {
                continue;
            }
            if let Some(request) = self.table.pop_best(now_ms) {
                debug!(id = request.id, "answering poll");
                out.push(self.frame_record(&request));
            }
        }
        out
    }

    /// Ground-role injection: pop the most starved sensor and frame it
    /// with the poll header. Nothing goes out before the MAVLink link is
    /// up, so the radio keeps announcing telemetry loss until there is
    /// real telemetry to show.
    pub fn inject_tick(&mut self, now_ms: u64) -> Option<BytesMut> {
        if self.role.is_poll_driven() || !self.state.connected() {
            return None;
        }
        let request = self.table.pop_best(now_ms)?;
        Some(self.frame_record(&request))
    }

    /// Frames to send up the MAVLink link: the bridge's own heartbeat, plus
    /// battery capacity parameter reads while those are still unanswered.
    /// ArduPilot only emits PARAM_VALUE on request, so without the reads
    /// the 0x5007 capacities would stay at zero.
    pub fn uplink_tick(&mut self, now_ms: u64) -> Vec<BytesMut> {
        let mut frames = Vec::new();

        if now_ms.saturating_sub(self.last_fc_heartbeat_ms) >= FC_HEARTBEAT_INTERVAL_MS {
            self.last_fc_heartbeat_ms = now_ms;
            frames.push(self.encoder.heartbeat());
        }

        if self.capacity_source == CapacitySource::Fc
            && self.state.connected()
            && self
                .last_capacity_request_ms
                .map_or(true, |t| now_ms.saturating_sub(t) >= CAPACITY_REQUEST_INTERVAL_MS)
            && (self.state.fc_bat1_capacity == 0 || self.state.fc_bat2_capacity == 0)
        {
            self.last_capacity_request_ms = Some(now_ms);
            for (received, name) in [
                (self.state.fc_bat1_capacity, "BATT_CAPACITY"),
                (self.state.fc_bat2_capacity, "BATT2_CAPACITY"),
            ] {
                if received == 0 {
                    debug!(name, "requesting battery capacity parameter");
                    frames.push(self.encoder.param_request_read(
                        self.fc_system_id,
                        self.fc_component_id,
                        name,
                    ));
                }
            }
        }

        frames
    }

    /// Periodic housekeeping: link supervision plus the loop-driven
    /// sensors (RSSI and parameters) that no MAVLink message triggers.
    pub fn tick(&mut self, now_ms: u64) {
        self.state.check_timeout(now_ms);

        if self.role.is_poll_driven()
            && self.sport_good
            && now_ms.saturating_sub(self.last_poll_ms) > self.sport_timeout_ms
        {
            self.sport_good = false;
            warn!("no receiver poll seen, S.Port link lost");
        }

        if !self.state.connected() {
            return;
        }

        if self.role.self_sources_rssi()
            && now_ms.saturating_sub(self.last_rssi_ms) >= self.rssi_interval_ms
        {
            self.last_rssi_ms = now_ms;
            self.packers
                .pack(sensor::RSSI, &mut self.state, &mut self.table, now_ms);
        }

        if self.state.rssi_good
            && (self.params_sent < PARAM_STARTUP_BURST
                || now_ms.saturating_sub(self.last_param_ms) >= self.param_interval_ms)
        {
            self.params_sent = self.params_sent.saturating_add(1);
            self.last_param_ms = now_ms;
            self.packers
                .pack(sensor::PARAMS, &mut self.state, &mut self.table, now_ms);
        }
    }
}

/// Write frames to a serial port, flushing after each so frames land
/// within their timing window.
async fn write_frames(port: &mut impl SerialIO, frames: &[BytesMut]) -> Result<()> {
    for frame in frames {
        port.write_all(frame)
            .await
            .map_err(|e| BridgeError::Serial(format!("Failed to write frame: {}", e)))?;
        port.flush()
            .await
            .map_err(|e| BridgeError::Serial(format!("Failed to flush S.Port: {}", e)))?;
    }
    Ok(())
}

/// One serviced wakeup of the run loop. The read futures mutably borrow
/// the ports, so the loop resolves to an event first and writes after,
/// once those borrows have ended.
enum Event {
    MavlinkRead(usize),
    SportRead(usize),
    Inject,
    LogStats,
    Shutdown,
}

/// Run the bridge until Ctrl+C.
pub async fn run(
    config: &Config,
    mut mavlink_port: impl SerialIO,
    mut sport_port: impl SerialIO,
) -> Result<()> {
    let mut bridge = Bridge::new(config);
    let start = Instant::now();
    let poll_driven = config.general.role.is_poll_driven();

    let mut inject = interval(Duration::from_millis(config.timing.inject_interval_ms));
    let mut stats_log = interval(Duration::from_secs(STATS_LOG_INTERVAL_SECS));

    let mut mav_buf = [0u8; 512];
    let mut sport_buf = [0u8; 64];

    info!(role = ?config.general.role, "bridge running");

    loop {
        let now_ms = start.elapsed().as_millis() as u64;

        let event = tokio::select! {
            n = mavlink_port.read(&mut mav_buf) => {
                Event::MavlinkRead(n.map_err(|e| BridgeError::Serial(
                    format!("MAVLink read failed: {}", e)
                ))?)
            }
            n = sport_port.read(&mut sport_buf), if poll_driven => {
                Event::SportRead(n.map_err(|e| BridgeError::Serial(
                    format!("S.Port read failed: {}", e)
                ))?)
            }
            _ = inject.tick() => Event::Inject,
            _ = stats_log.tick() => Event::LogStats,
            _ = tokio::signal::ctrl_c() => Event::Shutdown,
        };

        match event {
            Event::MavlinkRead(n) => {
                bridge.handle_mavlink(&mav_buf[..n], now_ms);
            }
            Event::SportRead(n) => {
                let frames = bridge.handle_sport(&sport_buf[..n], now_ms);
                write_frames(&mut sport_port, &frames).await?;
            }
            Event::Inject => {
                bridge.tick(now_ms);
                let uplink = bridge.uplink_tick(now_ms);
                write_frames(&mut mavlink_port, &uplink).await?;
                if let Some(frame) = bridge.inject_tick(now_ms) {
                    write_frames(&mut sport_port, std::slice::from_ref(&frame)).await?;
                }
            }
            Event::LogStats => {
                let stats = bridge.stats();
                info!(
                    received = stats.frames_received,
                    corrupt = stats.frames_corrupt,
                    unknown = stats.frames_unknown,
                    lost = stats.packets_lost,
                    dropped = bridge.dropped(),
                    "link statistics"
                );
            }
            Event::Shutdown => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::crc::{crc_accumulate, crc_calculate, crc_extra};
    use crate::serial::port_trait::mocks::MockSerialPort;

    fn test_config(role: &str) -> Config {
        let toml = format!(
            r#"
            [general]
            role = "{role}"
            [mavlink]
            [sport]
            [battery]
            [timing]
            "#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        config
    }

    fn v1_frame_from(msg_id: u8, payload: &[u8], seq: u8, sysid: u8) -> Vec<u8> {
        let mut frame = vec![0xFEu8, payload.len() as u8, seq, sysid, 1, msg_id];
        frame.extend_from_slice(payload);
        let crc = crc_accumulate(
            crc_extra(u32::from(msg_id)).unwrap(),
            crc_calculate(&frame[1..]),
        );
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    fn v1_frame(msg_id: u8, payload: &[u8], seq: u8) -> Vec<u8> {
        v1_frame_from(msg_id, payload, seq, 1)
    }

    fn param_value_frame(name: &str, value: f32, seq: u8) -> Vec<u8> {
        let mut payload = vec![0u8; 25];
        payload[..4].copy_from_slice(&value.to_le_bytes());
        payload[8..8 + name.len()].copy_from_slice(name.as_bytes());
        v1_frame(22, &payload, seq)
    }

    fn heartbeat_frame(seq: u8) -> Vec<u8> {
        // custom_mode 3, quad, APM, armed, active, mavlink v3
        v1_frame(0, &[3, 0, 0, 0, 2, 3, 0x81, 4, 3], seq)
    }

    fn connect(bridge: &mut Bridge, now_ms: u64) {
        for seq in 0..3 {
            bridge.handle_mavlink(&heartbeat_frame(seq), now_ms);
        }
    }

    /// Sensor ID from a framed record, accounting for the poll header and
    /// the announce prefix on the RSSI slot.
    fn frame_sensor_id(frame: &[u8], with_header: bool) -> u16 {
        let mut offset = if with_header { 2 } else { 0 };
        if frame[offset] == START_STOP {
            offset += 2;
        }
        assert_eq!(frame[offset], 0x10);
        // IDs under test contain no bytes that get stuffed.
        u16::from_le_bytes([frame[offset + 1], frame[offset + 2]])
    }

    #[test]
    fn test_ground_injects_with_poll_header() {
        let mut bridge = Bridge::new(&test_config("ground"));
        connect(&mut bridge, 0);

        let frame = bridge.inject_tick(100).expect("heartbeats queued status");
        assert_eq!(&frame[..2], &POLL_SEQUENCE[..]);
        assert_eq!(frame_sensor_id(&frame, true), sensor::AP_STATUS);
    }

    #[test]
    fn test_no_injection_while_disconnected() {
        let mut bridge = Bridge::new(&test_config("ground"));
        // One heartbeat is not enough to bring the link up.
        bridge.handle_mavlink(&heartbeat_frame(0), 0);
        assert!(bridge.inject_tick(100).is_none());
    }

    #[test]
    fn test_air_role_never_self_injects() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);
        assert!(bridge.inject_tick(100).is_none());
    }

    #[test]
    fn test_poll_answered_without_header() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);

        let frames = bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 100);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], 0x10);
        assert_eq!(frame_sensor_id(&frames[0], false), sensor::AP_STATUS);
        assert!(bridge.sport_good());
    }

    #[test]
    fn test_poll_split_across_reads() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);

        assert!(bridge.handle_sport(&[0x00, START_STOP], 100).is_empty());
        let frames = bridge.handle_sport(&[SENSOR_ID_28], 101);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_poll_with_empty_table_sends_nothing() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);
        // Drain the queued status frames first.
        while !bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 100).is_empty() {}

        assert!(bridge
            .handle_sport(&[START_STOP, SENSOR_ID_28], 200)
            .is_empty());
        assert!(bridge.sport_good());
    }

    #[test]
    fn test_sport_timeout_flags_link_lost() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);
        bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 100);
        assert!(bridge.sport_good());

        bridge.tick(5000);
        assert!(bridge.sport_good());
        bridge.tick(5200);
        assert!(!bridge.sport_good());
    }

    #[test]
    fn test_rssi_cadence_ground_role() {
        let mut bridge = Bridge::new(&test_config("ground"));
        connect(&mut bridge, 0);
        // Drain the heartbeat-triggered status frames.
        while bridge.inject_tick(50).is_some() {}

        bridge.tick(400);
        let frame = bridge.inject_tick(500).expect("rssi queued");
        assert_eq!(frame_sensor_id(&frame, true), sensor::RSSI);

        // Within the refresh interval nothing new is queued.
        bridge.tick(500);
        assert!(bridge.inject_tick(600).is_none());

        bridge.tick(400 + 350);
        assert!(bridge.inject_tick(900).is_some());
    }

    #[test]
    fn test_ground_rssi_frame_carries_announce_prefix() {
        let mut bridge = Bridge::new(&test_config("ground"));
        connect(&mut bridge, 0);
        while bridge.inject_tick(50).is_some() {}

        bridge.tick(400);
        let frame = bridge.inject_tick(500).expect("rssi queued");
        // Announce prefix, then the usual poll header, then the data frame.
        assert_eq!(&frame[..5], &[0x7E, 0x1B, 0x7E, 0x1B, 0x10]);
        assert_eq!(u16::from_le_bytes([frame[5], frame[6]]), sensor::RSSI);
    }

    #[test]
    fn test_relay_rssi_frame_not_announced() {
        let mut bridge = Bridge::new(&test_config("relay"));
        connect(&mut bridge, 0);
        while !bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 50).is_empty() {}

        bridge.tick(1000);
        let frames = bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 1100);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], 0x10);
        assert_eq!(frame_sensor_id(&frames[0], false), sensor::RSSI);
    }

    #[test]
    fn test_air_role_does_not_self_source_rssi() {
        let mut bridge = Bridge::new(&test_config("air"));
        connect(&mut bridge, 0);
        while !bridge.handle_sport(&[START_STOP, SENSOR_ID_28], 50).is_empty() {}

        bridge.tick(1000);
        assert!(bridge
            .handle_sport(&[START_STOP, SENSOR_ID_28], 2000)
            .is_empty());
    }

    #[test]
    fn test_param_burst_after_rssi_good() {
        let mut bridge = Bridge::new(&test_config("ground"));
        connect(&mut bridge, 0);
        while bridge.inject_tick(50).is_some() {}

        // No RSSI source yet: no parameter frames.
        bridge.tick(60);
        let mut ids = Vec::new();
        while let Some(frame) = bridge.inject_tick(70) {
            ids.push(frame_sensor_id(&frame, true));
        }
        assert!(!ids.contains(&sensor::PARAMS));

        // RADIO_STATUS brings RSSI up; the next ticks burst parameters.
        bridge.handle_mavlink(&v1_frame(109, &[0, 0, 0, 0, 127, 0, 0, 0, 0], 3), 80);
        bridge.tick(460);
        bridge.tick(470);
        bridge.tick(480);
        bridge.tick(490);

        let mut param_count = 0;
        while let Some(frame) = bridge.inject_tick(600) {
            if frame_sensor_id(&frame, true) == sensor::PARAMS {
                param_count += 1;
            }
        }
        assert_eq!(param_count, 3);
    }

    #[test]
    fn test_mavlink_timeout_stops_transmission() {
        let mut bridge = Bridge::new(&test_config("ground"));
        connect(&mut bridge, 0);
        while bridge.inject_tick(50).is_some() {}

        bridge.handle_mavlink(&v1_frame(74, &[0u8; 20], 3), 100);
        assert!(bridge.inject_tick(200).is_some());

        bridge.tick(7000);
        bridge.handle_mavlink(&v1_frame(74, &[0u8; 20], 4), 7100);
        assert!(bridge.inject_tick(7200).is_none());
    }

    #[test]
    fn test_uplink_heartbeat_cadence() {
        let mut bridge = Bridge::new(&test_config("air"));

        // Goes out regardless of connection state, every two seconds.
        assert!(bridge.uplink_tick(0).is_empty());
        let frames = bridge.uplink_tick(2000);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][5], 0); // HEARTBEAT
        assert_eq!(frames[0][3], 20); // bridge's own system id

        assert!(bridge.uplink_tick(3000).is_empty());
        assert_eq!(bridge.uplink_tick(4000).len(), 1);
    }

    #[test]
    fn test_capacity_params_requested_until_answered() {
        let mut bridge = Bridge::new(&test_config("ground"));

        // No requests before the MAVLink link is up.
        assert!(bridge.uplink_tick(100).is_empty());
        connect(&mut bridge, 150);

        let frames = bridge.uplink_tick(200);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f[5] == 20)); // PARAM_REQUEST_READ
        assert_eq!(&frames[0][10..23], b"BATT_CAPACITY");
        assert_eq!(&frames[1][10..24], b"BATT2_CAPACITY");

        // Within the retry interval, no further reads.
        assert!(bridge.uplink_tick(3000).iter().all(|f| f[5] == 0));

        // Battery 1 answered: only battery 2 is re-requested.
        bridge.handle_mavlink(&param_value_frame("BATT_CAPACITY", 3300.0, 3), 3100);
        let frames = bridge.uplink_tick(5300);
        let reads: Vec<_> = frames.iter().filter(|f| f[5] == 20).collect();
        assert_eq!(reads.len(), 1);
        assert_eq!(&reads[0][10..24], b"BATT2_CAPACITY");

        // Both answered: the requests stop.
        bridge.handle_mavlink(&param_value_frame("BATT2_CAPACITY", 2200.0, 4), 5400);
        assert!(bridge.uplink_tick(11_000).iter().all(|f| f[5] == 0));
    }

    #[test]
    fn test_local_capacity_source_sends_no_requests() {
        let config: Config = toml::from_str(
            r#"
            [general]
            role = "ground"
            [mavlink]
            [sport]
            [battery]
            capacity_source = "local"
            bat1_capacity_mah = 5200
            [timing]
            "#,
        )
        .unwrap();
        let mut bridge = Bridge::new(&config);
        connect(&mut bridge, 0);

        assert!(bridge.uplink_tick(6000).iter().all(|f| f[5] == 0));
    }

    #[test]
    fn test_param_read_targets_heartbeat_sender() {
        let mut bridge = Bridge::new(&test_config("ground"));
        for seq in 0..3 {
            let hb = v1_frame_from(0, &[3, 0, 0, 0, 2, 3, 0x81, 4, 3], seq, 7);
            bridge.handle_mavlink(&hb, 0);
        }

        let frames = bridge.uplink_tick(100);
        let read = frames.iter().find(|f| f[5] == 20).expect("capacity read");
        assert_eq!(read[8], 7); // target_system
    }

    #[test]
    fn test_unknown_mavlink_ids_counted() {
        let mut bridge = Bridge::new(&test_config("ground"));
        // Message id 77 is outside the decoded set, so its checksum
        // cannot be verified and the frame is only counted.
        bridge.handle_mavlink(&[0xFE, 2, 0, 1, 1, 77, 0xaa, 0xbb, 0x00, 0x00], 0);

        assert_eq!(bridge.stats().frames_unknown, 1);
        assert_eq!(bridge.stats().frames_corrupt, 0);
    }

    #[test]
    fn test_corrupt_mavlink_counted_not_forwarded() {
        let mut bridge = Bridge::new(&test_config("ground"));
        let mut bad = heartbeat_frame(0);
        let len = bad.len();
        bad[len - 1] ^= 0xff;
        bridge.handle_mavlink(&bad, 0);

        assert_eq!(bridge.stats().frames_corrupt, 1);
        assert!(bridge.inject_tick(100).is_none());
    }

    #[tokio::test]
    async fn test_write_frames_captures_and_flushes() {
        let mut port = MockSerialPort::new();
        let frames = vec![
            encode_frame(
                &PackRequest {
                    id: sensor::AP_STATUS,
                    sub_id: 0,
                    payload: 4,
                },
                true,
            ),
            encode_frame(
                &PackRequest {
                    id: sensor::HUD,
                    sub_id: 1,
                    payload: 0,
                },
                true,
            ),
        ];

        write_frames(&mut port, &frames).await.unwrap();
        let written = port.get_written_data();
        assert_eq!(written.len(), 2);
        assert_eq!(&written[0][..2], &POLL_SEQUENCE[..]);
    }

    #[tokio::test]
    async fn test_write_frames_surfaces_errors() {
        let mut port = MockSerialPort::new();
        port.set_write_error(std::io::ErrorKind::BrokenPipe);
        let frames = vec![encode_frame(
            &PackRequest {
                id: sensor::HUD,
                sub_id: 1,
                payload: 0,
            },
            false,
        )];

        let err = write_frames(&mut port, &frames).await.unwrap_err();
        assert!(matches!(err, BridgeError::Serial(_)));
    }
}
