//! In-memory storage implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::storage::{components, DirEntry, Opened, Storage, StorageFile};
use crate::error::{TpddError, TpddResult};
use crate::protocol::OpenMode;

type SharedData = Arc<Mutex<Vec<u8>>>;

/// Largest file the in-memory disk will hold.
const MAX_FILE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone)]
enum Node {
    File(SharedData),
    Directory,
}

/// Normalize to `/A/B` form (root is `/`).
fn normalize(path: &str) -> String {
    let mut out = String::new();
    for part in components(path) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Simple in-memory directory tree.
///
/// Open handles share their contents with the tree, so writes through a
/// handle are visible to later opens. Entries are listed in name order.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    nodes: BTreeMap<String, Node>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial files (parents are created as needed).
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let mut storage = Self::new();
        for (path, data) in files {
            storage.add_file(path.as_ref(), data);
        }
        storage
    }

    /// Add a file (convenience method). Missing parent folders are created.
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        let path = normalize(path);
        self.add_parents(&path);
        self.nodes
            .insert(path, Node::File(Arc::new(Mutex::new(data.into()))));
    }

    /// Add a folder and any missing parents.
    pub fn add_folder(&mut self, path: &str) {
        let path = normalize(path);
        self.add_parents(&path);
        if path != "/" {
            self.nodes.insert(path, Node::Directory);
        }
    }

    fn add_parents(&mut self, path: &str) {
        let mut parent = parent_of(path);
        while parent != "/" {
            self.nodes
                .entry(parent.to_string())
                .or_insert(Node::Directory);
            parent = parent_of(parent);
        }
    }

    /// Copy of a file's contents.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.get(&normalize(path))? {
            Node::File(data) => data.lock().ok().map(|d| d.clone()),
            Node::Directory => None,
        }
    }

    fn is_directory(&self, path: &str) -> bool {
        path == "/" || matches!(self.nodes.get(path), Some(Node::Directory))
    }

    fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
        self.nodes
            .iter()
            .filter(move |(path, _)| path.as_str() != dir && parent_of(path) == dir)
    }

    fn entry_for(&self, path: &str, node: &Node) -> DirEntry {
        match node {
            Node::File(data) => {
                let size = data.lock().map(|d| d.len() as u64).unwrap_or(0);
                DirEntry::file(name_of(path), size)
            }
            Node::Directory => DirEntry::folder(name_of(path)),
        }
    }
}

/// Handle onto a shared in-memory file.
struct MemoryFile {
    data: SharedData,
    pos: u64,
    append: bool,
}

impl StorageFile for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> TpddResult<usize> {
        let data = self.data.lock().map_err(|_| TpddError::LockPoisoned)?;
        let start = (self.pos as usize).min(data.len());
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        self.pos += len as u64;
        Ok(len)
    }

    fn write(&mut self, bytes: &[u8]) -> TpddResult<usize> {
        let mut data = self.data.lock().map_err(|_| TpddError::LockPoisoned)?;
        if self.append {
            self.pos = data.len() as u64;
        }
        let end = self
            .pos
            .checked_add(bytes.len() as u64)
            .filter(|&end| end <= MAX_FILE_SIZE as u64)
            .ok_or_else(|| TpddError::DiskFull(format!("{} bytes", MAX_FILE_SIZE)))?
            as usize;
        let start = self.pos as usize;
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        self.pos = end as u64;
        Ok(bytes.len())
    }

    fn seek(&mut self, pos: u64) -> TpddResult<()> {
        self.pos = pos;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.data.lock().map(|d| d.len() as u64).unwrap_or(0)
    }
}

impl Storage for MemoryStorage {
    fn mount(&mut self) -> TpddResult<()> {
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> TpddResult<Opened> {
        let path = normalize(path);
        if self.is_directory(&path) {
            return Ok(Opened::Directory);
        }

        let existing = match self.nodes.get(&path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        };
        let data = match (existing, mode) {
            (Some(data), OpenMode::Write) => {
                data.lock().map_err(|_| TpddError::LockPoisoned)?.clear();
                data
            }
            (Some(data), _) => data,
            (None, OpenMode::Read) => return Ok(Opened::NotFound),
            (None, _) => {
                if !self.is_directory(parent_of(&path)) {
                    return Err(TpddError::NotFound(parent_of(&path).to_string()));
                }
                let data: SharedData = Arc::default();
                self.nodes.insert(path, Node::File(data.clone()));
                data
            }
        };

        let append = mode == OpenMode::Append;
        let pos = if append {
            data.lock().map_err(|_| TpddError::LockPoisoned)?.len() as u64
        } else {
            0
        };
        Ok(Opened::File(Box::new(MemoryFile { data, pos, append })))
    }

    fn metadata(&self, path: &str) -> Option<DirEntry> {
        let path = normalize(path);
        if path == "/" {
            return Some(DirEntry::folder(""));
        }
        self.nodes
            .get(&path)
            .map(|node| self.entry_for(&path, node))
    }

    fn make_directory(&mut self, path: &str) -> TpddResult<()> {
        let path = normalize(path);
        if self.nodes.contains_key(&path) || path == "/" {
            return Err(TpddError::AlreadyExists(path));
        }
        if !self.is_directory(parent_of(&path)) {
            return Err(TpddError::NotFound(parent_of(&path).to_string()));
        }
        self.nodes.insert(path, Node::Directory);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> TpddResult<()> {
        let path = normalize(path);
        if !self.nodes.contains_key(&path) {
            return Err(TpddError::NotFound(path));
        }
        if self.children(&path).next().is_some() {
            return Err(TpddError::NotEmpty(path));
        }
        self.nodes.remove(&path);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> TpddResult<()> {
        let from = normalize(from);
        let to = normalize(to);
        if !self.nodes.contains_key(&from) {
            return Err(TpddError::NotFound(from));
        }
        if self.nodes.contains_key(&to) {
            return Err(TpddError::AlreadyExists(to));
        }

        // Move the entry and everything below it.
        let prefix = format!("{}/", from);
        let moved: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| **k == from || k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = self.nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                self.nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn open_directory(&self, path: &str) -> TpddResult<Box<dyn Iterator<Item = DirEntry> + '_>> {
        let path = normalize(path);
        if !self.is_directory(&path) {
            return Err(TpddError::NotADirectory(path));
        }
        let entries: Vec<DirEntry> = self
            .children(&path)
            .map(|(p, node)| self.entry_for(p, node))
            .collect();
        Ok(Box::new(entries.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_file(storage: &mut MemoryStorage, path: &str, mode: OpenMode) -> Box<dyn StorageFile> {
        match storage.open(path, mode).unwrap() {
            Opened::File(f) => f,
            _ => panic!("expected a file at {}", path),
        }
    }

    #[test]
    fn test_write_read_file() {
        let mut storage = MemoryStorage::new();
        let mut f = open_file(&mut storage, "/TEST.DO", OpenMode::Write);
        assert_eq!(f.write(b"HELLO").unwrap(), 5);
        drop(f);

        let mut f = open_file(&mut storage, "/TEST.DO", OpenMode::Read);
        let mut buf = [0u8; 16];
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"HELLO");
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_truncates_append_extends() {
        let mut storage = MemoryStorage::with_files([("/A.DO", b"OLD DATA".to_vec())]);
        let mut f = open_file(&mut storage, "/A.DO", OpenMode::Write);
        f.write(b"NEW").unwrap();
        drop(f);
        assert_eq!(storage.read_file("/A.DO"), Some(b"NEW".to_vec()));

        let mut f = open_file(&mut storage, "/A.DO", OpenMode::Append);
        f.write(b"ER").unwrap();
        drop(f);
        assert_eq!(storage.read_file("/A.DO"), Some(b"NEWER".to_vec()));
    }

    #[test]
    fn test_append_starts_at_end() {
        let mut storage = MemoryStorage::with_files([("/A.DO", b"0123456789".to_vec())]);
        let f = open_file(&mut storage, "/A.DO", OpenMode::Append);
        assert_eq!(f.position(), 10);
    }

    #[test]
    fn test_write_past_max_size_is_disk_full() {
        let mut storage = MemoryStorage::with_files([("/A.DO", b"ABC".to_vec())]);
        let mut f = open_file(&mut storage, "/A.DO", OpenMode::ReadWrite);
        f.seek(MAX_FILE_SIZE as u64).unwrap();
        assert!(matches!(f.write(b"x"), Err(TpddError::DiskFull(_))));
        f.seek(u64::MAX).unwrap();
        assert!(matches!(f.write(b"x"), Err(TpddError::DiskFull(_))));
        drop(f);
        assert_eq!(storage.read_file("/A.DO"), Some(b"ABC".to_vec()));
    }

    #[test]
    fn test_open_missing_for_read() {
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            storage.open("/NONE.DO", OpenMode::Read).unwrap(),
            Opened::NotFound
        ));
    }

    #[test]
    fn test_open_directory_reported() {
        let mut storage = MemoryStorage::new();
        storage.add_folder("/GAMES");
        assert!(matches!(
            storage.open("/GAMES/", OpenMode::Read).unwrap(),
            Opened::Directory
        ));
    }

    #[test]
    fn test_listing_is_one_level_and_sorted() {
        let mut storage = MemoryStorage::new();
        storage.add_file("/B.DO", vec![1, 2]);
        storage.add_file("/A.BA", vec![1]);
        storage.add_file("/GAMES/X.CO", vec![0; 10]);

        let names: Vec<_> = storage
            .open_directory("/")
            .unwrap()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["A.BA", "B.DO", "GAMES"]);

        let inner: Vec<_> = storage.open_directory("/GAMES/").unwrap().collect();
        assert_eq!(inner, vec![DirEntry::file("X.CO", 10)]);
    }

    #[test]
    fn test_remove_and_rename() {
        let mut storage = MemoryStorage::new();
        storage.add_file("/GAMES/X.CO", vec![0; 3]);

        assert!(matches!(storage.remove("/GAMES"), Err(TpddError::NotEmpty(_))));
        storage.rename("/GAMES", "/PLAY").unwrap();
        assert!(storage.exists("/PLAY/X.CO"));
        assert!(!storage.exists("/GAMES"));

        storage.remove("/PLAY/X.CO").unwrap();
        storage.remove("/PLAY").unwrap();
        assert!(matches!(storage.remove("/PLAY"), Err(TpddError::NotFound(_))));
    }

    #[test]
    fn test_make_directory() {
        let mut storage = MemoryStorage::new();
        storage.make_directory("/NEW/").unwrap();
        assert!(storage.metadata("/NEW").unwrap().is_folder);
        assert!(matches!(
            storage.make_directory("/NEW"),
            Err(TpddError::AlreadyExists(_))
        ));
        assert!(storage.make_directory("/A/B").is_err());
    }
}
