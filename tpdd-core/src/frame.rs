//! Byte-stream framer.
//!
//! Turns the raw serial stream into commands. A frame on the wire is
//! `'Z' 'Z' opcode length payload[length] checksum`; an `'M'` seen between
//! frames starts the legacy mode-switch micro-frame (mode byte, terminator).
//! A gap longer than the idle timeout between two bytes drops any partial
//! frame.

use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::protocol::{
    Checksum, OpenMode, SearchForm, SeekFrom, MODE_SWITCH, NAME_FIELD_SIZE, OFFSET_ATTRIBUTE,
    OFFSET_SEARCH_FORM, PAYLOAD_CAPACITY, SYNC,
};

/// Default gap after which a partial frame is discarded.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// A checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// A command decoded from a frame, one variant per opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reference {
        name: [u8; NAME_FIELD_SIZE],
        attribute: u8,
        search_form: Result<SearchForm, u8>,
    },
    Open(OpenMode),
    Close,
    Read,
    Write(Vec<u8>),
    Delete,
    Format,
    Status,
    DmeRequest,
    Seek(SeekFrom),
    Tell,
    Condition,
    Rename([u8; NAME_FIELD_SIZE]),
    VendorQuery23,
    VendorQuery31,
    /// Known opcode with a payload that cannot be decoded.
    Malformed(u8),
    /// Opcode this drive does not implement.
    Unknown(u8),
}

impl Command {
    /// Decode a verified frame.
    pub fn decode(frame: &Frame) -> Self {
        use crate::protocol::Opcode;

        let payload = frame.payload.as_slice();
        let opcode = match Opcode::try_from(frame.opcode) {
            Ok(op) => op,
            Err(code) => return Command::Unknown(code),
        };

        match opcode {
            Opcode::Reference => {
                if payload.len() <= OFFSET_SEARCH_FORM {
                    return Command::Malformed(frame.opcode);
                }
                let mut name = [0u8; NAME_FIELD_SIZE];
                name.copy_from_slice(&payload[..NAME_FIELD_SIZE]);
                Command::Reference {
                    name,
                    attribute: payload[OFFSET_ATTRIBUTE],
                    search_form: SearchForm::try_from(payload[OFFSET_SEARCH_FORM]),
                }
            }
            Opcode::Open => Command::Open(OpenMode::from(payload.first().copied().unwrap_or(0))),
            Opcode::Close => Command::Close,
            Opcode::Read => Command::Read,
            Opcode::Write => Command::Write(payload.to_vec()),
            Opcode::Delete => Command::Delete,
            Opcode::Format => Command::Format,
            Opcode::Status => Command::Status,
            Opcode::DmeRequest => Command::DmeRequest,
            Opcode::Seek => match SeekFrom::decode(payload) {
                Some(seek) => Command::Seek(seek),
                None => Command::Malformed(frame.opcode),
            },
            Opcode::Tell => Command::Tell,
            Opcode::Condition => Command::Condition,
            Opcode::Rename => {
                let mut name = [0u8; NAME_FIELD_SIZE];
                let len = payload.len().min(NAME_FIELD_SIZE);
                name[..len].copy_from_slice(&payload[..len]);
                Command::Rename(name)
            }
            Opcode::VendorQuery23 => Command::VendorQuery23,
            Opcode::VendorQuery31 => Command::VendorQuery31,
        }
    }
}

/// Output of the parser for one input byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// A complete, checksum-valid command.
    Command(Command),
    /// A complete frame whose checksum did not match.
    ChecksumError { expected: u8, received: u8 },
    /// A mode-switch micro-frame finished.
    ModeSwitch(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Idle,
    FoundZ,
    Opcode,
    Length,
    Payload,
    Checksum,
    ModeByte,
    ModeTerminator,
}

/// Stateful frame tokenizer fed one byte at a time.
pub struct FrameParser {
    state: ParseState,
    opcode: u8,
    length: usize,
    payload: Vec<u8>,
    checksum: Checksum,
    mode: u8,
    idle_timeout: Duration,
    last_byte: Option<Instant>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl FrameParser {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: ParseState::Idle,
            opcode: 0,
            length: 0,
            payload: Vec::with_capacity(PAYLOAD_CAPACITY),
            checksum: Checksum::new(),
            mode: 0,
            idle_timeout,
            last_byte: None,
        }
    }

    /// True when no frame is partially received.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::Idle
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.payload.clear();
        self.checksum = Checksum::new();
    }

    /// Feed one byte received at `now`.
    pub fn push(&mut self, byte: u8, now: Instant) -> Option<ParseEvent> {
        if let Some(last) = self.last_byte {
            if now.saturating_duration_since(last) > self.idle_timeout && !self.is_idle() {
                trace!("idle timeout in {:?}, dropping partial frame", self.state);
                self.reset();
            }
        }
        self.last_byte = Some(now);
        trace!("S:{:?}|D:{:02X}", self.state, byte);

        // 'Z' followed by anything else abandons the preamble and the byte
        // is handled as if seen between frames.
        if self.state == ParseState::FoundZ {
            if byte == SYNC {
                self.state = ParseState::Opcode;
                return None;
            }
            self.state = ParseState::Idle;
        }

        match self.state {
            ParseState::Idle => {
                match byte {
                    SYNC => self.state = ParseState::FoundZ,
                    MODE_SWITCH => self.state = ParseState::ModeByte,
                    _ => {}
                }
                None
            }
            ParseState::FoundZ => None,
            ParseState::Opcode => {
                if byte != SYNC {
                    self.opcode = byte;
                    self.checksum = Checksum::new();
                    self.checksum.accumulate(byte);
                    self.state = ParseState::Length;
                }
                None
            }
            ParseState::Length => {
                self.length = byte as usize;
                self.checksum.accumulate(byte);
                self.payload.clear();
                self.state = if self.length > 0 {
                    ParseState::Payload
                } else {
                    ParseState::Checksum
                };
                None
            }
            ParseState::Payload => {
                if self.payload.len() < self.length.min(PAYLOAD_CAPACITY) {
                    self.checksum.accumulate(byte);
                    self.payload.push(byte);
                }
                if self.payload.len() >= self.length {
                    self.state = ParseState::Checksum;
                }
                None
            }
            ParseState::Checksum => {
                let expected = self.checksum.take();
                let frame = Frame {
                    opcode: self.opcode,
                    payload: std::mem::take(&mut self.payload),
                };
                self.reset();
                if expected == byte {
                    Some(ParseEvent::Command(Command::decode(&frame)))
                } else {
                    warn!(
                        "Checksum Error: calc({:02X}) != sent({:02X})",
                        expected, byte
                    );
                    Some(ParseEvent::ChecksumError {
                        expected,
                        received: byte,
                    })
                }
            }
            ParseState::ModeByte => {
                self.mode = byte;
                self.state = ParseState::ModeTerminator;
                None
            }
            ParseState::ModeTerminator => {
                self.state = ParseState::Idle;
                Some(ParseEvent::ModeSwitch(self.mode))
            }
        }
    }
}

/// Encode a command frame, preamble included. Used by tests and host tools.
pub fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.extend_from_slice(&[SYNC, SYNC, opcode, payload.len() as u8]);
    out.extend_from_slice(payload);
    out.push(Checksum::of(opcode, payload));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut FrameParser, bytes: &[u8], at: Instant) -> Vec<ParseEvent> {
        bytes.iter().filter_map(|&b| parser.push(b, at)).collect()
    }

    #[test]
    fn test_status_frame() {
        let mut parser = FrameParser::default();
        let events = feed(&mut parser, &encode_frame(0x07, &[]), Instant::now());
        assert_eq!(events, vec![ParseEvent::Command(Command::Status)]);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_checksum_error() {
        let mut parser = FrameParser::default();
        let mut frame = encode_frame(0x02, &[]);
        *frame.last_mut().unwrap() ^= 0x01;
        let events = feed(&mut parser, &frame, Instant::now());
        assert!(matches!(
            events.as_slice(),
            [ParseEvent::ChecksumError { .. }]
        ));
        assert!(parser.is_idle());
    }

    #[test]
    fn test_noise_between_frames_ignored() {
        let mut parser = FrameParser::default();
        let mut bytes = b"xyR\r".to_vec();
        bytes.extend(encode_frame(0x02, &[]));
        let events = feed(&mut parser, &bytes, Instant::now());
        assert_eq!(events, vec![ParseEvent::Command(Command::Close)]);
    }

    #[test]
    fn test_extra_sync_bytes_swallowed() {
        let mut parser = FrameParser::default();
        let mut bytes = vec![b'Z'];
        bytes.extend(encode_frame(0x07, &[]));
        let events = feed(&mut parser, &bytes, Instant::now());
        assert_eq!(events, vec![ParseEvent::Command(Command::Status)]);
    }

    #[test]
    fn test_z_then_mode_switch() {
        let mut parser = FrameParser::default();
        let events = feed(&mut parser, b"ZM1\r", Instant::now());
        assert_eq!(events, vec![ParseEvent::ModeSwitch(b'1')]);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_write_payload() {
        let mut parser = FrameParser::default();
        let events = feed(&mut parser, &encode_frame(0x04, b"HELLO"), Instant::now());
        assert_eq!(
            events,
            vec![ParseEvent::Command(Command::Write(b"HELLO".to_vec()))]
        );
    }

    #[test]
    fn test_full_length_payload() {
        let mut parser = FrameParser::default();
        let data = vec![0xAA; 255];
        let events = feed(&mut parser, &encode_frame(0x04, &data), Instant::now());
        assert_eq!(events, vec![ParseEvent::Command(Command::Write(data))]);
    }

    #[test]
    fn test_reference_decode() {
        let mut payload = vec![b' '; NAME_FIELD_SIZE];
        payload[..6].copy_from_slice(b"LOADER");
        payload[6..9].copy_from_slice(b".DO");
        payload.push(b'F');
        payload.push(0x00);
        let mut parser = FrameParser::default();
        let events = feed(&mut parser, &encode_frame(0x00, &payload), Instant::now());
        match events.as_slice() {
            [ParseEvent::Command(Command::Reference {
                attribute,
                search_form,
                ..
            })] => {
                assert_eq!(*attribute, b'F');
                assert_eq!(*search_form, Ok(SearchForm::Pick));
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_short_reference_is_malformed() {
        let frame = Frame {
            opcode: 0x00,
            payload: vec![0; 10],
        };
        assert_eq!(Command::decode(&frame), Command::Malformed(0x00));
    }

    #[test]
    fn test_unknown_opcode() {
        let frame = Frame {
            opcode: 0x0E,
            payload: vec![],
        };
        assert_eq!(Command::decode(&frame), Command::Unknown(0x0E));
    }

    #[test]
    fn test_idle_timeout_discards_partial_frame() {
        let mut parser = FrameParser::default();
        let start = Instant::now();
        // opcode + length of a Write, then silence
        assert!(feed(&mut parser, &[b'Z', b'Z', 0x04, 0x03], start).is_empty());
        assert!(!parser.is_idle());

        let later = start + Duration::from_millis(600);
        let events = feed(&mut parser, &encode_frame(0x07, &[]), later);
        assert_eq!(events, vec![ParseEvent::Command(Command::Status)]);
    }

    #[test]
    fn test_short_gap_keeps_partial_frame() {
        let mut parser = FrameParser::default();
        let start = Instant::now();
        let frame = encode_frame(0x02, &[]);
        assert!(feed(&mut parser, &frame[..3], start).is_empty());
        let events = feed(&mut parser, &frame[3..], start + Duration::from_millis(400));
        assert_eq!(events, vec![ParseEvent::Command(Command::Close)]);
    }
}
