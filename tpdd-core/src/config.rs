//! Drive configuration, loadable from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::DEFAULT_ROOT_LABEL;
use crate::error::TpddResult;
use crate::path::DEFAULT_PATH_CAPACITY;

/// Runtime settings for the drive and its poll loop.
///
/// Every field is optional in the JSON form; missing ones take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Host directory served as the disk.
    pub root: PathBuf,
    /// Serial device.
    pub port: Option<String>,
    pub baud: u32,
    /// Gap after which a partial frame is dropped.
    pub idle_timeout_ms: u64,
    /// Quiet time before the poll loop starts sleeping.
    pub sleep_delay_ms: u64,
    /// Sleep between polls once the link is quiet.
    pub poll_interval_ms: u64,
    /// DME label of the root folder.
    pub root_label: String,
    /// Longest current-directory path, in bytes.
    pub path_capacity: usize,
    /// File sent to the host before the protocol loop starts.
    pub loader: Option<String>,
    /// Delay between loader bytes.
    pub loader_delay_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            port: None,
            baud: 19200,
            idle_timeout_ms: 500,
            sleep_delay_ms: 250,
            poll_interval_ms: 10,
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            path_capacity: DEFAULT_PATH_CAPACITY,
            loader: None,
            loader_delay_ms: 5,
        }
    }
}

impl DriveConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> TpddResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> TpddResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn sleep_delay(&self) -> Duration {
        Duration::from_millis(self.sleep_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn loader_delay(&self) -> Duration {
        Duration::from_millis(self.loader_delay_ms)
    }
}
