//! Storage abstractions for the drive.
//!
//! - `Storage`: backend interface (files, folders, directory iteration)
//! - `MemoryStorage`: in-memory implementation
//! - `HostStorage`: a host directory standing in for the SD card

mod host_storage;
mod memory_storage;
mod storage;

pub use host_storage::HostStorage;
pub use memory_storage::MemoryStorage;
pub use storage::{components, is_hidden_name, DirEntry, Opened, Storage, StorageFile};
