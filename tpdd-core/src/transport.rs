//! Serial transport abstraction.
//!
//! The `Transport` trait provides the byte primitives the drive needs, so the
//! same engine runs against a real serial port or the in-memory
//! `HeadlessTransport` used by tests.

use std::collections::VecDeque;

use crate::error::TpddResult;

/// Byte-oriented link to the host computer.
pub trait Transport: Send {
    /// Number of received bytes ready to read.
    fn bytes_available(&mut self) -> usize;

    /// Next received byte, or None if nothing is pending.
    fn read_byte(&mut self) -> Option<u8>;

    /// Send one byte.
    fn write_byte(&mut self, byte: u8) -> TpddResult<()>;

    /// Send a run of bytes. Default implementation writes byte by byte.
    fn write_all(&mut self, bytes: &[u8]) -> TpddResult<()> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Push buffered output to the wire.
    fn flush(&mut self) -> TpddResult<()> {
        Ok(())
    }
}

/// Headless transport for testing - captures output, provides queued input.
#[derive(Default)]
pub struct HeadlessTransport {
    output: Vec<u8>,
    input: VecDeque<u8>,
}

impl HeadlessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            output: Vec::new(),
            input: input.iter().copied().collect(),
        }
    }

    /// Queue bytes as if sent by the host.
    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Everything the drive has sent.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take and clear the captured output.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Transport for HeadlessTransport {
    fn bytes_available(&mut self) -> usize {
        self.input.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_byte(&mut self, byte: u8) -> TpddResult<()> {
        self.output.push(byte);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_transport_output() {
        let mut link = HeadlessTransport::new();
        link.write_all(&[0x12, 0x01, 0x00]).unwrap();
        assert_eq!(link.output(), &[0x12, 0x01, 0x00]);
        assert_eq!(link.take_output(), vec![0x12, 0x01, 0x00]);
        assert!(link.output().is_empty());
    }

    #[test]
    fn test_headless_transport_input() {
        let mut link = HeadlessTransport::with_input(b"ZZ");
        assert_eq!(link.bytes_available(), 2);
        assert_eq!(link.read_byte(), Some(b'Z'));
        assert_eq!(link.read_byte(), Some(b'Z'));
        assert_eq!(link.bytes_available(), 0);
        assert_eq!(link.read_byte(), None);
    }
}
