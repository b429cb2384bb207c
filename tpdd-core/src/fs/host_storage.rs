//! Host-directory storage: serves a directory on the host as the disk.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::storage::{components, DirEntry, Opened, Storage, StorageFile};
use crate::error::{TpddError, TpddResult};
use crate::protocol::OpenMode;

/// Storage rooted at a host directory.
///
/// Lookups fall back to a case-insensitive match per component, since the
/// host software sends upper-case names and FAT media compare without case.
pub struct HostStorage {
    root: PathBuf,
}

impl HostStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a protocol path onto the host filesystem.
    fn host_path(&self, path: &str) -> TpddResult<PathBuf> {
        let mut host = self.root.clone();
        for part in components(path) {
            if part == "." || part == ".." || part.contains('\\') {
                return Err(TpddError::InvalidName(part.to_string()));
            }
            let exact = host.join(part);
            host = if exact.exists() {
                exact
            } else {
                find_case_insensitive(&host, part).unwrap_or(exact)
            };
        }
        Ok(host)
    }
}

fn find_case_insensitive(dir: &Path, name: &str) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|e| e.path())
}

fn map_io(err: io::Error, path: &str) -> TpddError {
    match err.kind() {
        io::ErrorKind::NotFound => TpddError::NotFound(path.to_string()),
        io::ErrorKind::AlreadyExists => TpddError::AlreadyExists(path.to_string()),
        _ => TpddError::Io(err),
    }
}

/// An open host file; tracks its position for `position()`.
struct HostFile {
    file: File,
    pos: u64,
}

impl StorageFile for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> TpddResult<usize> {
        let n = self.file.read(buf)?;
        self.pos = self.file.stream_position()?;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> TpddResult<usize> {
        let n = self.file.write(data)?;
        self.pos = self.file.stream_position()?;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> TpddResult<()> {
        self.pos = self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

impl Storage for HostStorage {
    fn mount(&mut self) -> TpddResult<()> {
        let meta = fs::metadata(&self.root)?;
        if !meta.is_dir() {
            return Err(TpddError::NotADirectory(self.root.display().to_string()));
        }
        debug!("Mounted {}", self.root.display());
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> TpddResult<Opened> {
        let host = self.host_path(path)?;
        if host.is_dir() {
            return Ok(Opened::Directory);
        }

        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true).create(true),
        };

        match options.open(&host) {
            Ok(mut file) => {
                // An append handle only moves to the end on its first write.
                let pos = match mode {
                    OpenMode::Append => file.seek(SeekFrom::End(0))?,
                    _ => file.stream_position()?,
                };
                Ok(Opened::File(Box::new(HostFile { file, pos })))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && mode == OpenMode::Read => {
                Ok(Opened::NotFound)
            }
            Err(e) => Err(map_io(e, path)),
        }
    }

    fn metadata(&self, path: &str) -> Option<DirEntry> {
        let host = self.host_path(path).ok()?;
        let meta = fs::metadata(&host).ok()?;
        let name = host
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(if meta.is_dir() {
            DirEntry::folder(name)
        } else {
            DirEntry::file(name, meta.len())
        })
    }

    fn make_directory(&mut self, path: &str) -> TpddResult<()> {
        let host = self.host_path(path)?;
        fs::create_dir(&host).map_err(|e| map_io(e, path))
    }

    fn remove(&mut self, path: &str) -> TpddResult<()> {
        let host = self.host_path(path)?;
        let meta = fs::metadata(&host).map_err(|e| map_io(e, path))?;
        if meta.is_dir() {
            if fs::read_dir(&host)?.next().is_some() {
                return Err(TpddError::NotEmpty(path.to_string()));
            }
            fs::remove_dir(&host).map_err(|e| map_io(e, path))
        } else {
            fs::remove_file(&host).map_err(|e| map_io(e, path))
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> TpddResult<()> {
        let old = self.host_path(from)?;
        let new = self.host_path(to)?;
        if !old.exists() {
            return Err(TpddError::NotFound(from.to_string()));
        }
        if new.exists() {
            return Err(TpddError::AlreadyExists(to.to_string()));
        }
        fs::rename(&old, &new).map_err(|e| map_io(e, from))
    }

    fn open_directory(&self, path: &str) -> TpddResult<Box<dyn Iterator<Item = DirEntry> + '_>> {
        let host = self.host_path(path)?;
        let mut entries = Vec::new();
        for item in fs::read_dir(&host).map_err(|e| map_io(e, path))? {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", path, e);
                    continue;
                }
            };
            let name = item.file_name().to_string_lossy().into_owned();
            let meta = match item.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            entries.push(if meta.is_dir() {
                DirEntry::folder(name)
            } else {
                DirEntry::file(name, meta.len())
            });
        }
        // read_dir order is unspecified; enumeration re-opens the directory
        // on every step and needs the same order each time.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Box::new(entries.into_iter()))
    }
}
