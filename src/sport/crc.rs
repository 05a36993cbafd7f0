//! # S.Port Frame Checksum
//!
//! Running byte-sum with end-around carry. The trailer byte is chosen so
//! that summing every byte of a valid frame (header through trailer) with
//! carry folding yields 0xFF.

/// Incremental S.Port checksum accumulator.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameChecksum(u16);

impl FrameChecksum {
    pub fn new() -> Self {
        Self(0)
    }

    /// Fold one byte into the sum, wrapping the carry back in.
    pub fn accumulate(&mut self, byte: u8) {
        self.0 += u16::from(byte);
        self.0 += self.0 >> 8;
        self.0 &= 0xff;
    }

    /// The trailer byte that completes the frame.
    pub fn trailer(self) -> u8 {
        0xff - (self.0 as u8)
    }
}

/// Checks that a destuffed frame body (header through trailer) sums to 0xFF.
#[cfg(test)]
pub fn frame_is_valid(body: &[u8]) -> bool {
    let mut sum = FrameChecksum::new();
    for &b in body {
        sum.accumulate(b);
    }
    sum.0 == 0xff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailer_completes_sum() {
        let body = [0x10u8, 0x01, 0x50, 0xd2, 0x04, 0x00, 0x00];
        let mut sum = FrameChecksum::new();
        for &b in &body {
            sum.accumulate(b);
        }
        let trailer = sum.trailer();

        let mut full = body.to_vec();
        full.push(trailer);
        assert!(frame_is_valid(&full));
    }

    #[test]
    fn test_carry_folds() {
        // Bytes chosen to force multiple carries.
        let mut sum = FrameChecksum::new();
        for &b in &[0xffu8, 0xff, 0xff] {
            sum.accumulate(b);
        }
        let trailer = sum.trailer();
        let mut check = FrameChecksum::new();
        for &b in &[0xffu8, 0xff, 0xff, trailer] {
            check.accumulate(b);
        }
        assert_eq!(check.0, 0xff);
    }

    #[test]
    fn test_corrupt_byte_fails_validation() {
        let body = [0x10u8, 0x00, 0x50, 0x12, 0x34, 0x56, 0x78];
        let mut sum = FrameChecksum::new();
        for &b in &body {
            sum.accumulate(b);
        }
        let mut full = body.to_vec();
        full.push(sum.trailer());
        full[3] ^= 0x40;
        assert!(!frame_is_valid(&full));
    }
}
