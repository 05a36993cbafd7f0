//! # S.Port Wire Framing
//!
//! Turns an encoded sensor record into bytes on the wire: data frame
//! header, little-endian ID and payload, byte stuffing, and the inverted
//! checksum trailer.

use bytes::{BufMut, BytesMut};

use super::crc::FrameChecksum;
use super::pack::PackRequest;
use super::protocol::{BYTE_STUFF, DATA_FRAME, SENSOR_ID_28, START_STOP, STUFF_MASK};

/// The two-byte poll sequence a receiver sends to solicit sensor 28,
/// and what a ground-role transmitter prepends to announce a frame.
pub const POLL_SEQUENCE: [u8; 2] = [START_STOP, SENSOR_ID_28];

/// Append `byte` to `buf`, escaping the start and stuff markers.
fn put_stuffed(buf: &mut BytesMut, byte: u8) {
    if byte == START_STOP || byte == BYTE_STUFF {
        buf.put_u8(BYTE_STUFF);
        buf.put_u8(byte ^ STUFF_MASK);
    } else {
        buf.put_u8(byte);
    }
}

/// Encode one sensor record as an S.Port data frame.
///
/// With `with_poll_header` the poll sequence is prepended, which a
/// ground-role bridge does because there is no receiver on the bus to
/// provide it. The header bytes are not stuffed and not checksummed.
pub fn encode_frame(request: &PackRequest, with_poll_header: bool) -> BytesMut {
    let mut buf = BytesMut::with_capacity(20);
    if with_poll_header {
        buf.put_slice(&POLL_SEQUENCE);
    }

    let mut crc = FrameChecksum::new();
    let mut body = [0u8; 7];
    body[0] = DATA_FRAME;
    body[1..3].copy_from_slice(&request.id.to_le_bytes());
    body[3..7].copy_from_slice(&request.payload.to_le_bytes());

    for byte in body {
        crc.accumulate(byte);
        put_stuffed(&mut buf, byte);
    }
    put_stuffed(&mut buf, crc.trailer());

    buf
}
