//! Tandy Portable Disk Drive (TPDD) emulator core
//!
//! This crate implements the drive side of the TPDD serial protocol,
//! including the TS-DOS Directory Mode Extension (DME):
//! - Frame parsing and checksum verification
//! - Session state machine and command dispatch
//! - Wire filename translation and directory enumeration
//! - Storage and transport abstractions
//!
//! # Architecture
//!
//! - `Transport` trait: byte-level serial link to the host
//! - `Storage` trait: hierarchical filesystem standing in for the SD card
//! - `FrameParser`: turns the byte stream into `Command`s
//! - `Drive`: session state plus storage, answers each command
//! - `Emulator`: poll loop wiring the three together

pub mod config;
pub mod drive;
pub mod emulator;
pub mod enumerator;
pub mod error;
pub mod frame;
pub mod fs;
pub mod loader;
pub mod path;
pub mod protocol;
pub mod response;
pub mod session;
pub mod transfer;
pub mod transport;

pub use config::DriveConfig;
pub use drive::{Drive, DEFAULT_ROOT_LABEL, PARENT_NAME};
pub use emulator::Emulator;
pub use error::{TpddError, TpddResult};
pub use frame::{encode_frame, Command, Frame, FrameParser, ParseEvent};
pub use fs::{DirEntry, HostStorage, MemoryStorage, Opened, Storage, StorageFile};
pub use loader::send_loader;
pub use path::DirPath;
pub use protocol::{ErrorCode, OpenMode, SearchForm};
pub use session::{Session, SessionState};
pub use transport::{HeadlessTransport, Transport};
