//! Error types for the TPDD emulator.

use thiserror::Error;

use crate::protocol::ErrorCode;

/// Errors that can occur while serving the drive.
#[derive(Error, Debug)]
pub enum TpddError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Path exceeds {capacity} bytes: {path}")]
    PathTooLong { path: String, capacity: usize },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Disk full: {0}")]
    DiskFull(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TpddError {
    /// Nearest protocol error code for reporting this failure to the host.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            TpddError::NotFound(_) => ErrorCode::NoFile,
            TpddError::AlreadyExists(_) => ErrorCode::Exists,
            TpddError::NotADirectory(_) | TpddError::IsADirectory(_) => ErrorCode::FormatMismatch,
            TpddError::NotEmpty(_) => ErrorCode::WriteProtect,
            TpddError::PathTooLong { .. } => ErrorCode::DirectoryFull,
            TpddError::DiskFull(_) => ErrorCode::DiskFull,
            TpddError::InvalidName(_) => ErrorCode::NoStart,
            TpddError::LockPoisoned
            | TpddError::Transport(_)
            | TpddError::Io(_)
            | TpddError::Json(_) => ErrorCode::DataCrc,
        }
    }
}

/// Result type for TPDD operations.
pub type TpddResult<T> = Result<T, TpddError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(TpddError::NotFound("/A.DO".into()).error_code(), ErrorCode::NoFile);
        assert_eq!(TpddError::AlreadyExists("/A.DO".into()).error_code(), ErrorCode::Exists);
        let long = TpddError::PathTooLong {
            path: "/X".into(),
            capacity: 2,
        };
        assert_eq!(long.error_code(), ErrorCode::DirectoryFull);
        assert_eq!(TpddError::DiskFull("/A.DO".into()).error_code(), ErrorCode::DiskFull);
    }
}
