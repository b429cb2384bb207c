//! Per-connection session state.

use log::info;

use crate::enumerator::DirCursor;
use crate::fs::StorageFile;
use crate::path::DirPath;
use crate::protocol::{OpenMode, WireName};

/// Which commands are currently legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Listing a directory (first/next/previous).
    Enumerating,
    /// A name has been picked; Open, Delete and Rename act on it.
    Referenced,
    Writing,
    Reading,
    ReadWriting,
}

impl SessionState {
    /// True for the states that hold an open file.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Reading | Self::Writing | Self::ReadWriting)
    }

    /// State entered by opening a file in `mode`.
    pub fn for_mode(mode: OpenMode) -> Self {
        match mode {
            OpenMode::Read => Self::Reading,
            OpenMode::Write | OpenMode::Append => Self::Writing,
            OpenMode::ReadWrite => Self::ReadWriting,
        }
    }
}

/// Everything the drive remembers between commands.
///
/// The open file handle is only held in an open state; moving to any other
/// state closes it.
pub struct Session {
    state: SessionState,
    /// Mode of the last Open.
    pub mode: OpenMode,
    /// Enumeration position in the current directory.
    pub cursor: DirCursor,
    /// Directory Mode Extension, enabled by the first DME request.
    pub dme: bool,
    /// Current directory.
    pub path: DirPath,
    /// Name accepted by the last pick.
    pub reference: Option<WireName>,
    handle: Option<Box<dyn StorageFile>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DirPath::default())
    }
}

impl Session {
    pub fn new(path: DirPath) -> Self {
        Self {
            state: SessionState::Idle,
            mode: OpenMode::default(),
            cursor: DirCursor::new(),
            dme: false,
            path,
            reference: None,
            handle: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Change state, closing the open file unless the new state keeps it.
    pub fn set_state(&mut self, state: SessionState) {
        if state != self.state {
            info!("State {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        if !state.is_open() {
            self.handle = None;
        }
    }

    /// Back to Idle.
    pub fn reset(&mut self) {
        self.set_state(SessionState::Idle);
    }

    /// Take ownership of a freshly opened file.
    pub fn open_file(&mut self, file: Box<dyn StorageFile>, mode: OpenMode) {
        self.mode = mode;
        self.handle = Some(file);
        self.set_state(SessionState::for_mode(mode));
    }

    pub fn handle_mut(&mut self) -> Option<&mut (dyn StorageFile + 'static)> {
        self.handle.as_deref_mut()
    }

    pub fn has_open_file(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryStorage, Opened, Storage};

    #[test]
    fn test_leaving_open_state_closes_file() {
        let mut storage = MemoryStorage::with_files([("/A.DO", b"x".to_vec())]);
        let file = match storage.open("/A.DO", OpenMode::Read).unwrap() {
            Opened::File(f) => f,
            _ => panic!("expected file"),
        };

        let mut session = Session::default();
        session.open_file(file, OpenMode::Read);
        assert_eq!(session.state(), SessionState::Reading);
        assert!(session.has_open_file());

        session.set_state(SessionState::Referenced);
        assert!(!session.has_open_file());
    }

    #[test]
    fn test_state_for_mode() {
        assert_eq!(SessionState::for_mode(OpenMode::Append), SessionState::Writing);
        assert_eq!(
            SessionState::for_mode(OpenMode::ReadWrite),
            SessionState::ReadWriting
        );
        assert!(!SessionState::Referenced.is_open());
    }
}
