//! TPDD emulator - ties the transport, frame parser and drive together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::config::DriveConfig;
use crate::drive::Drive;
use crate::error::{TpddError, TpddResult};
use crate::frame::FrameParser;
use crate::fs::Storage;
use crate::transport::Transport;

/// Emulator state.
pub struct Emulator<T: Transport, S: Storage> {
    /// Serial link to the host.
    link: T,
    /// Byte-stream framer.
    parser: FrameParser,
    /// Session plus storage.
    drive: Drive<S>,
    /// Quiet time before the loop starts sleeping.
    sleep_delay: Duration,
    /// Sleep between polls while quiet.
    poll_interval: Duration,
    /// Time the last byte was processed.
    last_activity: Option<Instant>,
}

impl<T: Transport, S: Storage> Emulator<T, S> {
    /// Create an emulator with default settings.
    pub fn new(link: T, storage: S) -> Self {
        Self::with_config(link, storage, &DriveConfig::default())
    }

    pub fn with_config(link: T, storage: S, config: &DriveConfig) -> Self {
        Self {
            link,
            parser: FrameParser::new(config.idle_timeout()),
            drive: Drive::from_config(storage, config),
            sleep_delay: config.sleep_delay(),
            poll_interval: config.poll_interval(),
            last_activity: None,
        }
    }

    /// Mount the storage backend. Call once before polling.
    pub fn mount(&mut self) -> TpddResult<()> {
        self.drive.mount()?;
        info!("Storage mounted");
        Ok(())
    }

    pub fn drive(&self) -> &Drive<S> {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut Drive<S> {
        &mut self.drive
    }

    pub fn link(&self) -> &T {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    /// Feed every pending byte through the parser, running each completed
    /// command before reading on. Returns true if any byte was processed.
    pub fn poll(&mut self, now: Instant) -> TpddResult<bool> {
        let mut active = false;
        while self.link.bytes_available() > 0 {
            let Some(byte) = self.link.read_byte() else {
                break;
            };
            active = true;
            trace!("I:{:02X}", byte);
            if let Some(event) = self.parser.push(byte, now) {
                match self.drive.handle_event(event, &mut self.link) {
                    Ok(()) => {}
                    // Dropped reply; the host retries.
                    Err(TpddError::Transport(e)) => warn!("Reply not sent: {}", e),
                    Err(e) => return Err(e),
                }
            }
        }
        if active {
            self.last_activity = Some(now);
        }
        Ok(active)
    }

    /// True once the link has been quiet long enough to sleep between polls.
    pub fn should_sleep(&self, now: Instant) -> bool {
        if !self.parser.is_idle() {
            return false;
        }
        match self.last_activity {
            Some(last) => now.saturating_duration_since(last) >= self.sleep_delay,
            None => true,
        }
    }

    /// Poll until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) -> TpddResult<()> {
        info!("Waiting for host");
        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if self.poll(now)? {
                continue;
            }
            if self.should_sleep(now) {
                thread::sleep(self.poll_interval);
            } else {
                thread::yield_now();
            }
        }
        debug!("Shutdown requested");
        Ok(())
    }
}
