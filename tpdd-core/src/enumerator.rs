//! Directory enumeration for the first/next/previous reference protocol.
//!
//! The backend only offers sequential iteration, so every step re-opens the
//! directory and skips to the cursor. Hidden entries are never listed;
//! folders are listed only in DME mode.

use crate::error::TpddResult;
use crate::fs::{DirEntry, Storage};

/// Position within a directory listing.
///
/// `index` counts raw backend entries consumed, filtered ones included.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirCursor {
    index: usize,
    past_end: bool,
}

impl DirCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to before the first entry.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True once a Next ran off the end of the directory.
    pub fn is_past_end(&self) -> bool {
        self.past_end
    }
}

/// Whether an entry is shown to the host.
pub fn is_listed(entry: &DirEntry, dme: bool) -> bool {
    !entry.is_hidden && (!entry.is_folder || dme)
}

/// Advance to the next listed entry. None once the directory is exhausted.
pub fn next_entry<S: Storage + ?Sized>(
    storage: &S,
    dir: &str,
    cursor: &mut DirCursor,
    dme: bool,
) -> TpddResult<Option<DirEntry>> {
    if cursor.past_end {
        return Ok(None);
    }

    let mut index = cursor.index;
    for entry in storage.open_directory(dir)?.skip(cursor.index) {
        index += 1;
        if is_listed(&entry, dme) {
            cursor.index = index;
            return Ok(Some(entry));
        }
    }

    cursor.index = index;
    cursor.past_end = true;
    Ok(None)
}

/// Step back to the listed entry before the current one.
///
/// Stepping back from the first entry clamps the cursor at the start and
/// yields None.
pub fn previous_entry<S: Storage + ?Sized>(
    storage: &S,
    dir: &str,
    cursor: &mut DirCursor,
    dme: bool,
) -> TpddResult<Option<DirEntry>> {
    // Entries strictly before the one last returned.
    let limit = if cursor.past_end {
        cursor.index
    } else {
        cursor.index.saturating_sub(1)
    };
    cursor.past_end = false;

    let found = storage
        .open_directory(dir)?
        .take(limit)
        .enumerate()
        .filter(|(_, entry)| is_listed(entry, dme))
        .last();

    match found {
        Some((i, entry)) => {
            cursor.index = i + 1;
            Ok(Some(entry))
        }
        None => {
            cursor.index = 0;
            Ok(None)
        }
    }
}
