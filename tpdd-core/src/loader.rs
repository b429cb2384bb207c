//! Loader bootstrap: stream a BASIC loader to the host before the drive
//! protocol starts.

use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::error::{TpddError, TpddResult};
use crate::fs::{Opened, Storage};
use crate::protocol::{OpenMode, LOADER_END};
use crate::transport::Transport;

/// Send the file `name` from the storage root one byte at a time, followed
/// by the end-of-file token.
///
/// Returns the number of file bytes sent. A missing loader is skipped and
/// reported as zero bytes.
pub fn send_loader<T, S>(link: &mut T, storage: &mut S, name: &str, delay: Duration) -> TpddResult<usize>
where
    T: Transport + ?Sized,
    S: Storage + ?Sized,
{
    let path = format!("/{}", name.trim_start_matches('/'));
    let mut file = match storage.open(&path, OpenMode::Read)? {
        Opened::File(file) => file,
        Opened::NotFound => {
            warn!("Loader {} not found, skipping", path);
            return Ok(0);
        }
        Opened::Directory => return Err(TpddError::IsADirectory(path)),
    };

    info!("Sending loader {} ({} bytes)", path, file.size());
    let mut buf = [0u8; 128];
    let mut sent = 0;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            link.write_byte(byte)?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        sent += n;
    }
    link.write_byte(LOADER_END)?;
    link.flush()?;
    info!("Loader sent");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryStorage;
    use crate::transport::HeadlessTransport;

    #[test]
    fn test_send_loader_appends_eof() {
        let mut storage = MemoryStorage::with_files([("/LOADER.BA", b"10 PRINT".to_vec())]);
        let mut link = HeadlessTransport::new();

        let sent = send_loader(&mut link, &mut storage, "LOADER.BA", Duration::ZERO).unwrap();
        assert_eq!(sent, 8);
        assert_eq!(link.output(), b"10 PRINT\x1A");
    }

    #[test]
    fn test_missing_loader_is_skipped() {
        let mut storage = MemoryStorage::new();
        let mut link = HeadlessTransport::new();

        let sent = send_loader(&mut link, &mut storage, "NONE.BA", Duration::ZERO).unwrap();
        assert_eq!(sent, 0);
        assert!(link.output().is_empty());
    }
}
