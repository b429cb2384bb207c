//! Frame checksum: one's complement of the 8-bit byte sum.

/// Running checksum over the bytes of one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    sum: u8,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one byte to the running sum.
    pub fn accumulate(&mut self, byte: u8) -> u8 {
        self.sum = self.sum.wrapping_add(byte);
        self.sum
    }

    /// Add several bytes.
    pub fn accumulate_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.accumulate(b);
        }
    }

    /// Checksum byte for everything accumulated so far.
    pub fn finalize(&self) -> u8 {
        self.sum ^ 0xFF
    }

    /// Return the checksum byte and reset for the next frame.
    pub fn take(&mut self) -> u8 {
        let chk = self.finalize();
        self.sum = 0;
        chk
    }

    /// Checksum of a complete frame body.
    pub fn of(opcode: u8, payload: &[u8]) -> u8 {
        let mut chk = Self::new();
        chk.accumulate(opcode);
        chk.accumulate(payload.len() as u8);
        chk.accumulate_all(payload);
        chk.finalize()
    }
}
