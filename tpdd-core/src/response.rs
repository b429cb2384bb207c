//! Response frames sent to the host.
//!
//! Every return is `type length payload checksum`, with the checksum
//! accumulated over all bytes as they are written.

use log::{debug, trace};

use crate::error::TpddResult;
use crate::fs::DirEntry;
use crate::protocol::{
    encode_wire_name, Checksum, ErrorCode, ReturnType, DME_LABEL_LEN, DME_SUFFIX, FREE_SECTORS,
    FREE_SECTORS_EXTENDED, NAME_FIELD_SIZE,
};
use crate::transport::Transport;

/// Payload length of a reference return with a 16-bit size.
const REFERENCE_LEN: u8 = (NAME_FIELD_SIZE + 1 + 2 + 1) as u8;

/// Payload length of a reference return with a 32-bit size.
const REFERENCE_LEN_EXTENDED: u8 = (NAME_FIELD_SIZE + 1 + 4 + 1) as u8;

/// Payload fixed by TS-DOS for the 0x23 query.
const VENDOR_QUERY_23_REPLY: [u8; 15] = [
    0x41, 0x10, 0x01, 0x00, 0x50, 0x05, 0x00, 0x02, 0x00, 0x28, 0x00, 0xE1, 0x00, 0x00, 0x00,
];

/// Writes return frames through a transport.
pub struct ResponseWriter<'a, T: Transport + ?Sized> {
    link: &'a mut T,
    checksum: Checksum,
}

impl<'a, T: Transport + ?Sized> ResponseWriter<'a, T> {
    pub fn new(link: &'a mut T) -> Self {
        Self {
            link,
            checksum: Checksum::new(),
        }
    }

    fn send(&mut self, byte: u8) -> TpddResult<()> {
        let sum = self.checksum.accumulate(byte);
        trace!("O:{:02X}>{:02X}", byte, sum);
        self.link.write_byte(byte)
    }

    fn send_all(&mut self, bytes: &[u8]) -> TpddResult<()> {
        for &b in bytes {
            self.send(b)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> TpddResult<()> {
        let chk = self.checksum.take();
        trace!("O:{:02X}", chk);
        self.link.write_byte(chk)?;
        self.link.flush()
    }

    /// Send a frame of the given type carrying `payload`.
    pub fn frame(&mut self, kind: ReturnType, payload: &[u8]) -> TpddResult<()> {
        self.send(kind as u8)?;
        self.send(payload.len() as u8)?;
        self.send_all(payload)?;
        self.finish()
    }

    /// Normal return carrying an error code.
    pub fn normal(&mut self, code: ErrorCode) -> TpddResult<()> {
        debug!("R:Norm {:02X} ({:?})", code as u8, code);
        self.frame(ReturnType::Normal, &[code as u8])
    }

    /// Condition return carrying an error code.
    pub fn condition(&mut self, code: ErrorCode) -> TpddResult<()> {
        self.frame(ReturnType::Condition, &[code as u8])
    }

    /// Read return carrying file data.
    pub fn read(&mut self, data: &[u8]) -> TpddResult<()> {
        self.frame(ReturnType::Read, data)
    }

    /// Reference return for an entry, or the blank reference for `None`.
    ///
    /// Sizes are sent high byte first. Files over 64K use the extended
    /// form, which appends the upper 16 bits after the free-sector byte.
    pub fn reference(&mut self, entry: Option<&DirEntry>, dme: bool) -> TpddResult<()> {
        let size = entry.map_or(0, |e| u32::try_from(e.size).unwrap_or(u32::MAX));
        let extended = size > 0xFFFF;

        let mut payload = Vec::with_capacity(REFERENCE_LEN_EXTENDED as usize);
        match entry {
            Some(e) => {
                payload.extend_from_slice(&encode_wire_name(&e.name, e.is_folder, dme));
                payload.push(b'F');
            }
            None => {
                payload.extend_from_slice(&[0u8; NAME_FIELD_SIZE]);
                payload.push(0);
            }
        }
        payload.push((size >> 8) as u8);
        payload.push(size as u8);
        if extended {
            payload.push(FREE_SECTORS_EXTENDED);
            payload.push((size >> 24) as u8);
            payload.push((size >> 16) as u8);
        } else {
            payload.push(FREE_SECTORS);
        }
        let expected_len = if extended {
            REFERENCE_LEN_EXTENDED
        } else {
            REFERENCE_LEN
        };
        debug_assert_eq!(payload.len(), expected_len as usize);

        match entry {
            Some(e) => debug!("R:Ref '{}' folder={} size={}", e.name, e.is_folder, e.size),
            None => debug!("R:BRef"),
        }
        self.frame(ReturnType::Reference, &payload)
    }

    /// DME label return: space, 6-character label, `.<>`, space.
    pub fn dme_label(&mut self, label: &str) -> TpddResult<()> {
        let mut payload = Vec::with_capacity(11);
        payload.push(b' ');
        payload.extend(
            label
                .bytes()
                .chain(std::iter::repeat(b' '))
                .take(DME_LABEL_LEN),
        );
        payload.extend_from_slice(DME_SUFFIX.as_bytes());
        payload.push(b' ');
        self.frame(ReturnType::Normal, &payload)
    }

    /// Reply to the TS-DOS 0x31 query.
    pub fn vendor_query_31(&mut self) -> TpddResult<()> {
        self.frame(ReturnType::VendorQuery31, &[ErrorCode::Success as u8])
    }

    /// Reply to the TS-DOS 0x23 query.
    pub fn vendor_query_23(&mut self) -> TpddResult<()> {
        self.frame(ReturnType::VendorQuery23, &VENDOR_QUERY_23_REPLY)
    }
}
