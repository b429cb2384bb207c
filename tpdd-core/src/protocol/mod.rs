//! TPDD wire protocol definitions.
//!
//! This module holds the numeric constants of the protocol (command opcodes,
//! return frame types, error codes, open modes and search forms) plus the
//! checksum and filename codecs used on both directions of the link.

pub mod checksum;
pub mod name;

pub use checksum::Checksum;
pub use name::{
    decode_wire_name, encode_wire_name, WireName, BASENAME_LEN, DME_SUFFIX, NAME_FIELD_SIZE,
};

/// First byte of the two-byte frame preamble (`ZZ`).
pub const SYNC: u8 = b'Z';

/// Starts the legacy mode-switch micro-frame when seen outside a frame.
pub const MODE_SWITCH: u8 = b'M';

/// Capacity of the command payload buffer.
pub const PAYLOAD_CAPACITY: usize = 256;

/// Maximum number of file bytes carried by one read return.
pub const READ_CHUNK: usize = 128;

/// Free-sector count reported in reference returns.
pub const FREE_SECTORS: u8 = 0x9D;

/// Free-sector byte used by the extended (32-bit size) reference return.
pub const FREE_SECTORS_EXTENDED: u8 = b'P';

/// Offset of the attribute byte inside a reference request.
pub const OFFSET_ATTRIBUTE: usize = 0x18;

/// Offset of the search form byte inside a reference request.
pub const OFFSET_SEARCH_FORM: usize = 0x19;

/// Length of the label carried by a DME label return.
pub const DME_LABEL_LEN: usize = 6;

/// Token sent after a loader file (BASIC end of file).
pub const LOADER_END: u8 = 0x1A;

/// Command opcodes sent by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// 0x00: Directory reference (pick, first, next, previous, done)
    Reference = 0x00,
    /// 0x01: Open the referenced entry
    Open = 0x01,
    /// 0x02: Close
    Close = 0x02,
    /// 0x03: Read a block
    Read = 0x03,
    /// 0x04: Write a block
    Write = 0x04,
    /// 0x05: Delete the referenced entry
    Delete = 0x05,
    /// 0x06: Format disk
    Format = 0x06,
    /// 0x07: Drive status
    Status = 0x07,
    /// 0x08: DME label request
    DmeRequest = 0x08,
    /// 0x09: Seek (extension)
    Seek = 0x09,
    /// 0x0A: Tell (extension)
    Tell = 0x0A,
    /// 0x0C: Drive condition
    Condition = 0x0C,
    /// 0x0D: Rename the referenced entry
    Rename = 0x0D,
    /// 0x23: TS-DOS vendor query
    VendorQuery23 = 0x23,
    /// 0x31: TS-DOS vendor query
    VendorQuery31 = 0x31,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Reference),
            0x01 => Ok(Self::Open),
            0x02 => Ok(Self::Close),
            0x03 => Ok(Self::Read),
            0x04 => Ok(Self::Write),
            0x05 => Ok(Self::Delete),
            0x06 => Ok(Self::Format),
            0x07 => Ok(Self::Status),
            0x08 => Ok(Self::DmeRequest),
            0x09 => Ok(Self::Seek),
            0x0A => Ok(Self::Tell),
            0x0C => Ok(Self::Condition),
            0x0D => Ok(Self::Rename),
            0x23 => Ok(Self::VendorQuery23),
            0x31 => Ok(Self::VendorQuery31),
            _ => Err(value),
        }
    }
}

/// Frame types sent back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnType {
    Read = 0x10,
    Reference = 0x11,
    Normal = 0x12,
    VendorQuery23 = 0x14,
    Condition = 0x15,
    VendorQuery31 = 0x38,
}

/// Error codes carried by normal and condition returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Success = 0x00,
    NoFile = 0x10,
    Exists = 0x11,
    NoName = 0x30,
    DirSearch = 0x31,
    Bank = 0x35,
    Parameter = 0x36,
    FormatMismatch = 0x37,
    Eof = 0x3F,
    NoStart = 0x40,
    IdCrc = 0x41,
    SectorLength = 0x42,
    FormatVerify = 0x44,
    FormatInterrupt = 0x46,
    EraseOffset = 0x47,
    DataCrc = 0x49,
    SectorNumber = 0x4A,
    ReadTimeout = 0x4B,
    SectorNumber2 = 0x4D,
    WriteProtect = 0x50,
    DiskNotInitialized = 0x5E,
    DirectoryFull = 0x60,
    DiskFull = 0x61,
    FileLength = 0x6E,
    NoDisk = 0x70,
    DiskChanged = 0x71,
}

/// Access mode requested by Open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Write from the start, creating or truncating.
    Write,
    /// Write at the end, creating if missing.
    Append,
    /// Read only.
    #[default]
    Read,
    /// Read and write, creating if missing (extension).
    ReadWrite,
}

impl From<u8> for OpenMode {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Write,
            2 => Self::Append,
            4 => Self::ReadWrite,
            _ => Self::Read,
        }
    }
}

/// Sub-operation selected by a reference request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchForm {
    Pick,
    First,
    Next,
    Previous,
    Done,
}

impl TryFrom<u8> for SearchForm {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pick),
            1 => Ok(Self::First),
            2 => Ok(Self::Next),
            3 => Ok(Self::Previous),
            4 => Ok(Self::Done),
            _ => Err(value),
        }
    }
}

/// Origin of a seek request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u32),
    Current(i32),
    End(i32),
}

impl SeekFrom {
    /// Decode a 5-byte seek payload: whence then little-endian offset.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != 5 {
            return None;
        }
        let raw = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        match payload[0] {
            1 => Some(Self::Start(raw)),
            2 => Some(Self::Current(raw as i32)),
            3 => Some(Self::End(raw as i32)),
            _ => None,
        }
    }

    /// Resolve to an absolute position, clamped at zero.
    pub fn resolve(self, position: u64, size: u64) -> u64 {
        match self {
            Self::Start(pos) => pos as u64,
            Self::Current(delta) => position.saturating_add_signed(delta as i64),
            Self::End(delta) => size.saturating_add_signed(delta as i64),
        }
    }
}
