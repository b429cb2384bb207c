//! The emulated drive: session state plus storage, driven by commands.
//!
//! Every checksum-valid command is checked against the session state and
//! routed to its handler. Each handler answers with exactly one return frame
//! and leaves the session consistent: the path ends in `/`, and a file
//! handle is held only while a file is open.

use log::{debug, info, warn};

use crate::config::DriveConfig;
use crate::enumerator::{next_entry, previous_entry};
use crate::error::TpddResult;
use crate::frame::{Command, ParseEvent};
use crate::fs::{DirEntry, Opened, Storage};
use crate::path::DirPath;
use crate::protocol::{
    decode_wire_name, ErrorCode, OpenMode, SearchForm, BASENAME_LEN, NAME_FIELD_SIZE,
};
use crate::response::ResponseWriter;
use crate::session::{Session, SessionState};
use crate::transport::Transport;

/// Name of the synthetic entry that leads to the parent folder in DME mode.
pub const PARENT_NAME: &str = "PARENT";

/// Label reported for the root folder when none is configured.
pub const DEFAULT_ROOT_LABEL: &str = "SD:";

/// TPDD drive bound to a storage backend.
pub struct Drive<S: Storage> {
    pub(crate) session: Session,
    pub(crate) storage: S,
    root_label: String,
}

impl<S: Storage> Drive<S> {
    /// Create a drive with default settings.
    pub fn new(storage: S) -> Self {
        Self {
            session: Session::default(),
            storage,
            root_label: DEFAULT_ROOT_LABEL.to_string(),
        }
    }

    /// Create a drive using the label and path capacity from `config`.
    pub fn from_config(storage: S, config: &DriveConfig) -> Self {
        Self {
            session: Session::new(DirPath::new(config.path_capacity)),
            storage,
            root_label: config.root_label.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Mount the storage backend.
    pub fn mount(&mut self) -> TpddResult<()> {
        self.storage.mount()
    }

    /// Act on one parser event.
    pub fn handle_event<T: Transport + ?Sized>(
        &mut self,
        event: ParseEvent,
        link: &mut T,
    ) -> TpddResult<()> {
        match event {
            ParseEvent::Command(cmd) => self.dispatch(cmd, link),
            ParseEvent::ChecksumError { .. } => {
                ResponseWriter::new(link).normal(ErrorCode::IdCrc)
            }
            ParseEvent::ModeSwitch(mode) => {
                debug!("Mode switch {:02X}", mode);
                self.session.reset();
                Ok(())
            }
        }
    }

    /// Run one command and send its return.
    pub fn dispatch<T: Transport + ?Sized>(&mut self, cmd: Command, link: &mut T) -> TpddResult<()> {
        debug!(
            "Command {:?} in {:?}{}",
            cmd,
            self.session.state(),
            if self.session.dme { " (DME)" } else { "" }
        );
        let mut out = ResponseWriter::new(link);

        match cmd {
            Command::Reference {
                name, search_form, ..
            } => self.req_reference(&name, search_form, &mut out),
            Command::Open(mode) => self.req_open(mode, &mut out),
            Command::Close => self.req_close(&mut out),
            Command::Read => self.req_read(&mut out),
            Command::Write(data) => self.req_write(&data, &mut out),
            Command::Delete => self.req_delete(&mut out),
            Command::Format => {
                // Nothing to format on an SD card; always succeeds.
                self.session.reset();
                out.normal(ErrorCode::Success)
            }
            Command::Status => out.normal(ErrorCode::Success),
            Command::DmeRequest => self.req_dme_label(&mut out),
            Command::Seek(seek) => self.req_seek(seek, &mut out),
            Command::Tell => self.req_tell(&mut out),
            Command::Condition => out.condition(ErrorCode::Success),
            Command::Rename(name) => self.req_rename(&name, &mut out),
            Command::VendorQuery23 => out.vendor_query_23(),
            Command::VendorQuery31 => out.vendor_query_31(),
            Command::Malformed(opcode) => {
                warn!("Malformed payload for opcode {:02X}", opcode);
                out.normal(ErrorCode::Parameter)
            }
            Command::Unknown(opcode) => {
                debug!("Unimplemented opcode {:02X}", opcode);
                out.normal(ErrorCode::Parameter)
            }
        }
    }

    /// Drop back to Idle and report `code`.
    pub(crate) fn fail<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
        code: ErrorCode,
    ) -> TpddResult<()> {
        self.session.reset();
        out.normal(code)
    }

    fn parent_entry() -> DirEntry {
        DirEntry::folder(PARENT_NAME)
    }

    /// Full name of the folder listed under the 6-character `short` name.
    ///
    /// DME listings cut folder names to 6 characters. None when `short`
    /// exists as is or matches no single longer folder.
    fn expand_folder_name(&self, short: &str) -> Option<String> {
        if short.len() != BASENAME_LEN {
            return None;
        }
        let dir = self.session.path.as_str();
        if self.storage.exists(&format!("{}{}", dir, short)) {
            return None;
        }
        let mut matches = self
            .storage
            .open_directory(dir)
            .ok()?
            .filter(|e| e.is_folder && !e.is_hidden && e.name.len() > BASENAME_LEN)
            .filter(|e| e.name.as_bytes()[..BASENAME_LEN].eq_ignore_ascii_case(short.as_bytes()));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first.name),
        }
    }

    fn in_subfolder(&self) -> bool {
        self.session.dme && !self.session.path.is_root()
    }

    // ==================== Reference ====================

    fn req_reference<T: Transport + ?Sized>(
        &mut self,
        name: &[u8; NAME_FIELD_SIZE],
        search_form: Result<SearchForm, u8>,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        let form = match search_form {
            Ok(form) => form,
            Err(value) => {
                debug!("Bad search form {:02X}", value);
                return self.fail(out, ErrorCode::Parameter);
            }
        };
        let dme = self.session.dme;

        match form {
            SearchForm::Pick => {
                let mut wire = decode_wire_name(name, dme);
                if wire.is_folder {
                    if let Some(full) = self.expand_folder_name(&wire.name) {
                        wire.name = full;
                    }
                }
                info!("Ref: '{}'{}", wire.name, if wire.is_folder { " <dir>" } else { "" });
                self.session.set_state(SessionState::Referenced);

                let entry = if wire.is_empty() {
                    None
                } else {
                    self.session
                        .path
                        .join(&wire.name)
                        .ok()
                        .and_then(|path| self.storage.metadata(&path))
                };
                self.session.reference = Some(wire);
                out.reference(entry.as_ref(), dme)
            }
            SearchForm::First => {
                self.session.set_state(SessionState::Enumerating);
                self.session.cursor.reset();
                if self.in_subfolder() {
                    out.reference(Some(&Self::parent_entry()), dme)
                } else {
                    self.list_step(true, out)
                }
            }
            SearchForm::Next | SearchForm::Previous => {
                if self.session.state() != SessionState::Enumerating {
                    return self.fail(out, ErrorCode::DirSearch);
                }
                self.list_step(form == SearchForm::Next, out)
            }
            SearchForm::Done => {
                self.session.reset();
                out.normal(ErrorCode::Success)
            }
        }
    }

    /// Return the next (or previous) listed entry of the current folder.
    fn list_step<T: Transport + ?Sized>(
        &mut self,
        forward: bool,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        let dme = self.session.dme;
        let dir = self.session.path.as_str().to_string();
        let cursor = &mut self.session.cursor;

        let step = if forward {
            next_entry(&self.storage, &dir, cursor, dme)
        } else {
            previous_entry(&self.storage, &dir, cursor, dme)
        };

        match step {
            Ok(Some(entry)) => out.reference(Some(&entry), dme),
            // Backing up past the first entry lands on PARENT in a subfolder.
            Ok(None) if !forward && self.in_subfolder() => {
                out.reference(Some(&Self::parent_entry()), dme)
            }
            Ok(None) => out.reference(None, dme),
            Err(e) => {
                warn!("Listing {} failed: {}", dir, e);
                self.fail(out, ErrorCode::DirSearch)
            }
        }
    }

    // ==================== Open ====================

    fn req_open<T: Transport + ?Sized>(
        &mut self,
        mode: OpenMode,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        if self.session.state() != SessionState::Referenced {
            return self.fail(out, ErrorCode::NoFile);
        }
        let wire = match self.session.reference.clone() {
            Some(wire) if !wire.is_empty() => wire,
            _ => return self.fail(out, ErrorCode::NoStart),
        };
        let dme = self.session.dme;

        if dme && wire.name == PARENT_NAME {
            self.session.path.pop();
            info!("Directory: {}", self.session.path.as_str());
            self.session.reset();
            return out.normal(ErrorCode::Success);
        }

        let target = match self.session.path.join(&wire.name) {
            Ok(target) => target,
            Err(e) => return self.fail(out, e.error_code()),
        };

        if dme && wire.is_folder && !self.storage.exists(&target) {
            return match self.storage.make_directory(&target) {
                Ok(()) => {
                    info!("Created folder {}", target);
                    self.session.reset();
                    out.normal(ErrorCode::Success)
                }
                Err(e) => {
                    warn!("mkdir {} failed: {}", target, e);
                    self.fail(out, e.error_code())
                }
            };
        }

        match self.storage.open(&target, mode) {
            Ok(Opened::Directory) => match self.session.path.push(&wire.name) {
                Ok(()) => {
                    info!("Directory: {}", self.session.path.as_str());
                    self.session.reset();
                    out.normal(ErrorCode::Success)
                }
                Err(e) => {
                    warn!("Cannot enter {}: {}", target, e);
                    self.fail(out, e.error_code())
                }
            },
            Ok(Opened::File(file)) => {
                info!("Opened {} ({:?})", target, mode);
                self.session.open_file(file, mode);
                out.normal(ErrorCode::Success)
            }
            Ok(Opened::NotFound) => self.fail(out, ErrorCode::NoFile),
            Err(e) => {
                warn!("Open {} failed: {}", target, e);
                self.fail(out, e.error_code())
            }
        }
    }

    // ==================== DME ====================

    fn req_dme_label<T: Transport + ?Sized>(
        &mut self,
        out: &mut ResponseWriter<'_, T>,
    ) -> TpddResult<()> {
        if !self.session.dme {
            info!("DME enabled");
        }
        self.session.dme = true;
        let label = self
            .session
            .path
            .last_component()
            .unwrap_or(self.root_label.as_str());
        out.dme_label(label)
    }
}
