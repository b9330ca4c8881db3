//! Running checksum for API frames.
//!
//! The checksum covers the frame type byte and the payload, not the start
//! delimiter or the length field. The trailing byte is chosen so that the
//! sum of all covered bytes plus the checksum equals `0xFF` modulo 256.

/// Accumulates the 8-bit checksum of an API frame.
#[derive(Debug, Default)]
pub struct Checksum {
    value: u16,
}

impl Checksum {
    /// Creates an empty checksum accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single byte.
    pub fn add(&mut self, byte: u8) {
        self.value = (self.value + u16::from(byte)) & 0xFF;
    }

    /// Adds a slice of bytes. An empty slice is a no-op.
    pub fn add_all(&mut self, data: &[u8]) {
        for &b in data {
            self.add(b);
        }
    }

    /// Resets the accumulator.
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Generates the trailing checksum byte for the accumulated data.
    #[must_use]
    pub fn generate(&self) -> u8 {
        0xFF - (self.value & 0xFF) as u8
    }

    /// Validates an accumulator that has been fed the covered bytes *and*
    /// the received checksum byte.
    #[must_use]
    pub fn validate(&self) -> bool {
        (self.value & 0xFF) == 0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_at_ni_request() {
        // Frame type 0x08, frame id 0x01, command "NI".
        let mut cksum = Checksum::new();
        cksum.add_all(&[0x08, 0x01, 0x4E, 0x49]);
        assert_eq!(cksum.generate(), 0x5F);
    }

    #[test]
    fn test_validate_roundtrip() {
        let data = [0x08, 0x01, 0x4E, 0x49, 0x11];
        let mut cksum = Checksum::new();
        cksum.add_all(&data);
        let trailing = cksum.generate();

        let mut verify = Checksum::new();
        verify.add_all(&data);
        verify.add(trailing);
        assert!(verify.validate());
    }

    #[test]
    fn test_validate_rejects_corruption() {
        let mut cksum = Checksum::new();
        cksum.add_all(&[0x08, 0x01, 0x4E, 0x49]);
        cksum.add(0x60); // correct value is 0x5F
        assert!(!cksum.validate());
    }

    #[test]
    fn test_sum_plus_checksum_is_ff() {
        for data in [&[0u8, 0, 0][..], &[0xFF, 0xFF][..], &[0x12, 0x34, 0x56][..]] {
            let mut cksum = Checksum::new();
            cksum.add_all(data);
            let sum: u32 = data.iter().map(|&b| u32::from(b)).sum();
            assert_eq!((sum + u32::from(cksum.generate())) % 256, 0xFF);
        }
    }

    #[test]
    fn test_empty_add_is_noop() {
        let mut cksum = Checksum::new();
        cksum.add_all(&[]);
        assert_eq!(cksum.generate(), 0xFF);
    }

    #[test]
    fn test_reset() {
        let mut cksum = Checksum::new();
        cksum.add_all(&[0x10, 0x20]);
        cksum.reset();
        assert_eq!(cksum.generate(), 0xFF);
    }
}
