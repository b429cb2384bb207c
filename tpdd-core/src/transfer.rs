//! File transfer handlers: close, read, write, delete, rename, seek, tell.

use log::{debug, info, warn};

use crate::drive::Drive;
use crate::error::{TpddError, TpddResult};
use crate::fs::Storage;
use crate::protocol::{decode_wire_name, ErrorCode, SeekFrom, NAME_FIELD_SIZE, READ_CHUNK};
use crate::response::ResponseWriter;
use crate::session::SessionState;
use crate::transport::Transport;

impl<S: Storage> Drive<S> {
    pub(crate) fn req_close<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        self.session.reset();
        out.normal(ErrorCode::Success)
    }

    pub(crate) fn req_read<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        match self.session.state() {
            SessionState::Reading | SessionState::ReadWriting => {}
            SessionState::Writing => return self.fail(out, ErrorCode::FormatMismatch),
            _ => return self.fail(out, ErrorCode::NoName),
        }
        let Some(file) = self.session.handle_mut() else {
            return self.fail(out, ErrorCode::NoName);
        };

        let mut buf = [0u8; READ_CHUNK];
        match file.read(&mut buf) {
            Ok(0) => out.normal(ErrorCode::Eof),
            Ok(n) => {
                debug!("Read {} bytes, now at {}", n, file.position());
                out.read(&buf[..n])
            }
            Err(e) => {
                warn!("Read failed: {}", e);
                out.normal(ErrorCode::DataCrc)
            }
        }
    }

    pub(crate) fn req_write<T: Transport + ?Sized>(
        &mut self,
        data: &[u8],
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        match self.session.state() {
            SessionState::Writing | SessionState::ReadWriting => {}
            SessionState::Reading => return self.fail(out, ErrorCode::FormatMismatch),
            _ => return self.fail(out, ErrorCode::NoName),
        }
        let Some(file) = self.session.handle_mut() else {
            return self.fail(out, ErrorCode::NoName);
        };

        match file.write(data) {
            Ok(n) if n == data.len() => out.normal(ErrorCode::Success),
            Ok(n) => {
                warn!("Short write: {} of {} bytes", n, data.len());
                out.normal(ErrorCode::SectorNumber)
            }
            Err(e @ TpddError::DiskFull(_)) => {
                warn!("Write failed: {}", e);
                out.normal(e.error_code())
            }
            Err(e) => {
                warn!("Write failed: {}", e);
                out.normal(ErrorCode::DataCrc)
            }
        }
    }

    /// Full path of the referenced entry, if the session holds a usable one.
    fn referenced_path(&self) -> Option<(String, bool)> {
        if self.session.state() != SessionState::Referenced {
            return None;
        }
        let wire = self.session.reference.as_ref().filter(|w| !w.is_empty())?;
        let path = self.session.path.join(&wire.name).ok()?;
        Some((path, wire.is_folder))
    }

    pub(crate) fn req_delete<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        let Some((path, _)) = self.referenced_path() else {
            return self.fail(out, ErrorCode::NoFile);
        };
        let Some(entry) = self.storage.metadata(&path) else {
            return self.fail(out, ErrorCode::NoFile);
        };
        // Folders are only visible, and so only deletable, in DME mode.
        if entry.is_folder && !self.session.dme {
            return self.fail(out, ErrorCode::NoFile);
        }

        let result = self.storage.remove(&path);
        self.session.reset();
        match result {
            Ok(()) => {
                info!("Deleted {}", path);
                out.normal(ErrorCode::Success)
            }
            Err(e) => {
                warn!("Delete {} failed: {}", path, e);
                out.normal(e.error_code())
            }
        }
    }

    pub(crate) fn req_rename<T: Transport + ?Sized>(
        &mut self,
        name: &[u8; NAME_FIELD_SIZE],
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        let Some((from, _)) = self.referenced_path() else {
            return self.fail(out, ErrorCode::NoFile);
        };
        if !self.storage.exists(&from) {
            return self.fail(out, ErrorCode::NoFile);
        }

        let new_name = decode_wire_name(name, self.session.dme);
        if new_name.is_empty() {
            return self.fail(out, ErrorCode::NoStart);
        }
        let to = match self.session.path.join(&new_name.name) {
            Ok(to) => to,
            Err(e) => return self.fail(out, e.error_code()),
        };

        let result = self.storage.rename(&from, &to);
        self.session.reset();
        match result {
            Ok(()) => {
                info!("Renamed {} -> {}", from, to);
                out.normal(ErrorCode::Success)
            }
            Err(e) => {
                warn!("Rename {} -> {} failed: {}", from, to, e);
                out.normal(e.error_code())
            }
        }
    }

    pub(crate) fn req_seek<T: Transport + ?Sized>(
        &mut self,
        seek: SeekFrom,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        if !self.session.state().is_open() {
            return out.normal(ErrorCode::NoName);
        }
        let Some(file) = self.session.handle_mut() else {
            return out.normal(ErrorCode::NoName);
        };

        let target = seek.resolve(file.position(), file.size());
        match file.seek(target) {
            Ok(()) => {
                debug!("Seek {:?} -> {}", seek, target);
                out.normal(ErrorCode::Success)
            }
            Err(e) => {
                warn!("Seek to {} failed: {}", target, e);
                out.normal(ErrorCode::DataCrc)
            }
        }
    }

    pub(crate) fn req_tell<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        if !self.session.state().is_open() {
            return out.normal(ErrorCode::NoName);
        }
        let Some(file) = self.session.handle_mut() else {
            return out.normal(ErrorCode::NoName);
        };

        let pos = u32::try_from(file.position()).unwrap_or(u32::MAX);
        out.read(&pos.to_le_bytes())
    }
}
