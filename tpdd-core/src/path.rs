//! Current-directory path buffer.

use crate::error::{TpddError, TpddResult};

/// Default capacity of the path buffer in bytes.
pub const DEFAULT_PATH_CAPACITY: usize = 64;

/// Absolute path of the current directory, bounded in length.
///
/// Always starts and ends with `/`. Operations that would exceed the
/// capacity fail and leave the buffer unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirPath {
    buf: String,
    capacity: usize,
}

impl Default for DirPath {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CAPACITY)
    }
}

impl DirPath {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: String::from("/"),
            capacity: capacity.max(1),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of folders below the root.
    pub fn depth(&self) -> usize {
        self.buf.split('/').filter(|c| !c.is_empty()).count()
    }

    pub fn is_root(&self) -> bool {
        self.buf == "/"
    }

    /// Name of the innermost folder, None at the root.
    pub fn last_component(&self) -> Option<&str> {
        self.buf.split('/').filter(|c| !c.is_empty()).last()
    }

    fn check_name(name: &str) -> TpddResult<()> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(TpddError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn check_len(&self, path: String) -> TpddResult<String> {
        if path.len() > self.capacity {
            return Err(TpddError::PathTooLong {
                path,
                capacity: self.capacity,
            });
        }
        Ok(path)
    }

    /// Full path of an entry in the current directory.
    pub fn join(&self, name: &str) -> TpddResult<String> {
        Self::check_name(name)?;
        self.check_len(format!("{}{}", self.buf, name))
    }

    /// Enter a folder of the current directory.
    pub fn push(&mut self, name: &str) -> TpddResult<()> {
        Self::check_name(name)?;
        self.buf = self.check_len(format!("{}{}/", self.buf, name))?;
        Ok(())
    }

    /// Leave the current folder. Returns false at the root.
    pub fn pop(&mut self) -> bool {
        if self.is_root() {
            return false;
        }
        let trimmed = self.buf.trim_end_matches('/');
        let cut = trimmed.rfind('/').map_or(1, |pos| pos + 1);
        self.buf.truncate(cut);
        true
    }
}
