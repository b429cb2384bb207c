//! Storage trait - the filesystem the drive serves files from.
//!
//! Paths handed to a `Storage` are absolute, `/`-separated and may carry a
//! trailing `/` when they name a directory.

use crate::error::TpddResult;
use crate::protocol::OpenMode;

/// One directory entry as seen by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_folder: bool,
    pub is_hidden: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        Self {
            is_hidden: is_hidden_name(&name),
            name,
            size,
            is_folder: false,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            is_hidden: is_hidden_name(&name),
            name,
            size: 0,
            is_folder: true,
        }
    }
}

/// Dot-files are hidden from directory listings.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Split a path into its non-empty components.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// An open file. Dropping the handle closes it.
pub trait StorageFile: Send {
    /// Read up to `buf.len()` bytes. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> TpddResult<usize>;

    /// Write `data`, returning how many bytes were stored.
    fn write(&mut self, data: &[u8]) -> TpddResult<usize>;

    /// Move to an absolute position.
    fn seek(&mut self, pos: u64) -> TpddResult<()>;

    /// Current position.
    fn position(&self) -> u64;

    /// Current file size.
    fn size(&self) -> u64;
}

/// Result of opening a path.
pub enum Opened {
    File(Box<dyn StorageFile>),
    Directory,
    NotFound,
}

/// Filesystem interface behind the drive.
pub trait Storage: Send {
    /// Prepare the medium. Called once before serving.
    fn mount(&mut self) -> TpddResult<()>;

    /// Open a path. Directories are reported, not opened.
    fn open(&mut self, path: &str, mode: OpenMode) -> TpddResult<Opened>;

    /// Entry information for a path, None if it does not exist.
    fn metadata(&self, path: &str) -> Option<DirEntry>;

    /// Check if a path exists.
    fn exists(&self, path: &str) -> bool {
        self.metadata(path).is_some()
    }

    /// Create a directory. The parent must exist.
    fn make_directory(&mut self, path: &str) -> TpddResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&mut self, path: &str) -> TpddResult<()>;

    /// Rename an entry within the storage.
    fn rename(&mut self, from: &str, to: &str) -> TpddResult<()>;

    /// Iterate the entries of a directory in a stable order.
    fn open_directory(&self, path: &str) -> TpddResult<Box<dyn Iterator<Item = DirEntry> + '_>>;
}
