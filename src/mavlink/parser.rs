//! # MAVLink Streaming Parser
//!
//! Incremental parser for MAVLink v1 and v2 frames arriving over a byte
//! stream. Bytes are fed one at a time; a complete, CRC-verified frame is
//! returned as soon as its last checksum byte arrives. Anything that does
//! not parse is skipped silently and the hunt for the next start byte
//! resumes at the following byte.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::crc::{crc_accumulate, crc_extra};

/// MAVLink v1 start byte
pub const MAVLINK_V1_STX: u8 = 0xFE;
/// MAVLink v2 start byte
pub const MAVLINK_V2_STX: u8 = 0xFD;

/// Maximum payload length for any MAVLink frame
const MAX_PAYLOAD_LEN: usize = 255;

/// Signature trailer length for signed v2 frames
const V2_SIGNATURE_LEN: usize = 13;

/// A CRC-verified frame with its addressing fields and raw payload.
///
/// v2 payloads arrive zero-truncated; decoders must treat bytes past the
/// end of `payload` as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub msg_id: u32,
    pub system_id: u8,
    pub component_id: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

/// Link quality counters maintained across the life of the parser.
#[derive(Debug, Default, Clone)]
pub struct LinkStats {
    /// Frames that parsed and CRC-verified
    pub frames_received: u64,
    /// Frames that failed CRC verification
    pub frames_corrupt: u64,
    /// Frames with message IDs outside the decoded set (not CRC-checkable)
    pub frames_unknown: u64,
    /// Gaps inferred from per-sender sequence numbers
    pub packets_lost: u64,
}

#[derive(Debug)]
enum ParseState {
    /// Hunting for a start byte
    Idle,
    /// Accumulating the fixed-size header that follows the start byte
    Header { v2: bool },
    /// Accumulating payload plus the two checksum bytes
    Body {
        v2: bool,
        payload_len: usize,
        signed: bool,
        msg_id: u32,
        system_id: u8,
        component_id: u8,
        sequence: u8,
    },
    /// Discarding an unverifiable signature trailer
    Signature { remaining: usize },
}

/// Incremental MAVLink frame parser with per-sender loss accounting.
pub struct MavlinkParser {
    state: ParseState,
    /// Bytes after the start byte, accumulated for CRC
    buffer: Vec<u8>,
    stats: LinkStats,
    /// Next expected sequence number per (system_id, component_id)
    expected_seq: HashMap<(u8, u8), u8>,
}

impl MavlinkParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            buffer: Vec::with_capacity(MAX_PAYLOAD_LEN + 12),
            stats: LinkStats::default(),
            expected_seq: HashMap::new(),
        }
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Feed one byte; returns a frame when this byte completes one.
    pub fn push_byte(&mut self, byte: u8) -> Option<RawFrame> {
        match self.state {
            ParseState::Idle => {
                if byte == MAVLINK_V1_STX || byte == MAVLINK_V2_STX {
                    self.buffer.clear();
                    self.state = ParseState::Header {
                        v2: byte == MAVLINK_V2_STX,
                    };
                }
                None
            }
            ParseState::Header { v2 } => {
                self.buffer.push(byte);
                let header_len = if v2 { 9 } else { 5 };
                if self.buffer.len() < header_len {
                    return None;
                }

                let payload_len = self.buffer[0] as usize;
                let (signed, sequence, system_id, component_id, msg_id) = if v2 {
                    let msg_id = u32::from(self.buffer[6])
                        | u32::from(self.buffer[7]) << 8
                        | u32::from(self.buffer[8]) << 16;
                    (
                        self.buffer[1] & 0x01 != 0,
                        self.buffer[3],
                        self.buffer[4],
                        self.buffer[5],
                        msg_id,
                    )
                } else {
                    (
                        false,
                        self.buffer[1],
                        self.buffer[2],
                        self.buffer[3],
                        u32::from(self.buffer[4]),
                    )
                };

                self.state = ParseState::Body {
                    v2,
                    payload_len,
                    signed,
                    msg_id,
                    system_id,
                    component_id,
                    sequence,
                };
                None
            }
            ParseState::Body {
                v2,
                payload_len,
                signed,
                msg_id,
                system_id,
                component_id,
                sequence,
            } => {
                self.buffer.push(byte);
                let header_len = if v2 { 9 } else { 5 };
                if self.buffer.len() < header_len + payload_len + 2 {
                    return None;
                }

                let frame = self.finish_frame(
                    header_len,
                    payload_len,
                    msg_id,
                    system_id,
                    component_id,
                    sequence,
                );
                self.state = if signed {
                    ParseState::Signature {
                        remaining: V2_SIGNATURE_LEN,
                    }
                } else {
                    ParseState::Idle
                };
                frame
            }
            ParseState::Signature { remaining } => {
                if remaining > 1 {
                    self.state = ParseState::Signature {
                        remaining: remaining - 1,
                    };
                } else {
                    self.state = ParseState::Idle;
                }
                None
            }
        }
    }

    fn finish_frame(
        &mut self,
        header_len: usize,
        payload_len: usize,
        msg_id: u32,
        system_id: u8,
        component_id: u8,
        sequence: u8,
    ) -> Option<RawFrame> {
        let Some(extra) = crc_extra(msg_id) else {
            // No CRC_EXTRA known, so the checksum cannot be verified.
            self.stats.frames_unknown += 1;
            trace!(msg_id, "skipping frame with unknown message id");
            return None;
        };

        let crc_region = &self.buffer[..header_len + payload_len];
        let mut crc = crc_region.iter().fold(0xffffu16, |c, &b| crc_accumulate(b, c));
        crc = crc_accumulate(extra, crc);

        let received = u16::from(self.buffer[header_len + payload_len])
            | u16::from(self.buffer[header_len + payload_len + 1]) << 8;

        if crc != received {
            self.stats.frames_corrupt += 1;
            debug!(msg_id, "dropping frame with bad checksum");
            return None;
        }

        self.track_sequence(system_id, component_id, sequence);
        self.stats.frames_received += 1;

        Some(RawFrame {
            msg_id,
            system_id,
            component_id,
            sequence,
            payload: self.buffer[header_len..header_len + payload_len].to_vec(),
        })
    }

    fn track_sequence(&mut self, system_id: u8, component_id: u8, sequence: u8) {
        let key = (system_id, component_id);
        if let Some(expected) = self.expected_seq.get(&key) {
            let gap = sequence.wrapping_sub(*expected);
            if gap != 0 {
                self.stats.packets_lost += u64::from(gap);
                debug!(system_id, component_id, gap, "sequence gap detected");
            }
        }
        self.expected_seq.insert(key, sequence.wrapping_add(1));
    }
}

impl Default for MavlinkParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::crc::crc_calculate;

    /// Build a valid v1 frame for the given message.
    fn v1_frame(msg_id: u8, seq: u8, sysid: u8, compid: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![MAVLINK_V1_STX, payload.len() as u8, seq, sysid, compid, msg_id];
        frame.extend_from_slice(payload);
        let mut crc = crc_calculate(&frame[1..]);
        crc = crc_accumulate(crc_extra(u32::from(msg_id)).unwrap(), crc);
        frame.push((crc & 0xff) as u8);
        frame.push((crc >> 8) as u8);
        frame
    }

    /// Build a valid v2 frame, with optional zero-truncation of the payload.
    fn v2_frame(msg_id: u32, seq: u8, sysid: u8, compid: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![
            MAVLINK_V2_STX,
            payload.len() as u8,
            0, // incompat_flags
            0, // compat_flags
            seq,
            sysid,
            compid,
            (msg_id & 0xff) as u8,
            ((msg_id >> 8) & 0xff) as u8,
            ((msg_id >> 16) & 0xff) as u8,
        ];
        frame.extend_from_slice(payload);
        let mut crc = crc_calculate(&frame[1..]);
        crc = crc_accumulate(crc_extra(msg_id).unwrap(), crc);
        frame.push((crc & 0xff) as u8);
        frame.push((crc >> 8) as u8);
        frame
    }

    fn feed(parser: &mut MavlinkParser, bytes: &[u8]) -> Vec<RawFrame> {
        bytes.iter().filter_map(|&b| parser.push_byte(b)).collect()
    }

    #[test]
    fn test_parses_v1_heartbeat() {
        let payload = [0u8, 0, 0, 0, 2, 3, 81, 4, 3];
        let frame = v1_frame(0, 0, 1, 1, &payload);

        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &frame);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_id, 0);
        assert_eq!(frames[0].system_id, 1);
        assert_eq!(frames[0].payload, payload);
        assert_eq!(parser.stats().frames_received, 1);
    }

    #[test]
    fn test_parses_v2_frame() {
        let payload = [0x39u8, 0x05, 0x00, 0x00]; // MISSION_CURRENT, truncated
        let frame = v2_frame(42, 7, 1, 1, &payload[..2]);

        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &frame);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_id, 42);
        assert_eq!(frames[0].payload, &payload[..2]);
    }

    #[test]
    fn test_bad_crc_dropped_and_counted() {
        let mut frame = v1_frame(0, 0, 1, 1, &[0u8; 9]);
        let last = frame.len() - 1;
        frame[last] ^= 0xff;

        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &frame);

        assert!(frames.is_empty());
        assert_eq!(parser.stats().frames_corrupt, 1);
        assert_eq!(parser.stats().frames_received, 0);
    }

    #[test]
    fn test_resyncs_after_garbage() {
        let mut stream = vec![0x12, 0x34, 0xfe, 0x01]; // noise, including a fake STX
        stream.extend_from_slice(&[0u8; 20]); // fake frame body fails CRC
        stream.extend_from_slice(&v1_frame(0, 3, 1, 1, &[0u8; 9]));

        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 3);
    }

    #[test]
    fn test_unknown_message_id_skipped_silently() {
        // Message id 77 is outside the decoded set.
        let mut frame = vec![MAVLINK_V1_STX, 2, 0, 1, 1, 77, 0xaa, 0xbb, 0x00, 0x00];
        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &frame);

        assert!(frames.is_empty());
        assert_eq!(parser.stats().frames_unknown, 1);
        assert_eq!(parser.stats().frames_corrupt, 0);

        // A valid frame right after still parses.
        frame = v1_frame(0, 0, 1, 1, &[0u8; 9]);
        let frames = feed(&mut parser, &frame);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_sequence_gap_counted_per_sender() {
        let mut parser = MavlinkParser::new();

        feed(&mut parser, &v1_frame(0, 10, 1, 1, &[0u8; 9]));
        feed(&mut parser, &v1_frame(0, 14, 1, 1, &[0u8; 9])); // 3 lost
        // Different component: its own sequence space.
        feed(&mut parser, &v1_frame(0, 200, 1, 2, &[0u8; 9]));
        feed(&mut parser, &v1_frame(0, 201, 1, 2, &[0u8; 9]));

        assert_eq!(parser.stats().packets_lost, 3);
    }

    #[test]
    fn test_sequence_wraparound_not_a_loss() {
        let mut parser = MavlinkParser::new();
        feed(&mut parser, &v1_frame(0, 255, 1, 1, &[0u8; 9]));
        feed(&mut parser, &v1_frame(0, 0, 1, 1, &[0u8; 9]));
        assert_eq!(parser.stats().packets_lost, 0);
    }

    #[test]
    fn test_signed_v2_signature_consumed() {
        let payload = [0u8; 2];
        let mut frame = v2_frame(42, 0, 1, 1, &payload);
        frame[2] = 0x01; // set MAVLINK_IFLAG_SIGNED
        // Flag is inside the CRC region, so recompute.
        let body_end = frame.len() - 2;
        let mut crc = crc_calculate(&frame[1..body_end]);
        crc = crc_accumulate(crc_extra(42).unwrap(), crc);
        frame[body_end] = (crc & 0xff) as u8;
        frame[body_end + 1] = (crc >> 8) as u8;
        // Signature trailer, then a second frame.
        frame.extend_from_slice(&[0xfe; 13]);
        frame.extend_from_slice(&v1_frame(0, 0, 1, 1, &[0u8; 9]));

        let mut parser = MavlinkParser::new();
        let frames = feed(&mut parser, &frame);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].msg_id, 42);
        assert_eq!(frames[1].msg_id, 0);
    }
}
