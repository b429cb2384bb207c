//! TPDD CLI - serve a directory as a Tandy Portable Disk Drive.
//!
//! Usage:
//!   tpdd --port <device> [--root <dir>] [options]
//!
//! Examples:
//!   tpdd --port /dev/ttyUSB0                     # Serve the current directory
//!   tpdd --port /dev/ttyUSB0 --root ~/m100       # Serve ~/m100
//!   tpdd --port /dev/ttyUSB0 --send-loader       # Send LOADER.BA first
//!   tpdd --port /dev/ttyUSB0 --memory -vv        # Empty RAM disk, trace frames

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn, LevelFilter};
use serialport::SerialPort;

use tpdd_core::{
    send_loader, DriveConfig, Emulator, HostStorage, MemoryStorage, Storage, TpddError,
    TpddResult, Transport,
};

/// Loader sent when `--send-loader` is given without a name.
const DEFAULT_LOADER: &str = "LOADER.BA";

/// TPDD Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "tpdd")]
#[command(about = "Serve a directory as a Tandy Portable Disk Drive")]
struct Args {
    /// Serial device the host is attached to
    #[arg(short, long)]
    port: Option<String>,

    /// Line rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Directory to serve
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve an empty in-memory disk instead of a directory
    #[arg(long)]
    memory: bool,

    /// Send a BASIC loader before starting the drive
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_LOADER)]
    send_loader: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Overlay command-line values on the loaded configuration.
    fn apply(&self, config: &mut DriveConfig) {
        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.baud = baud;
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(loader) = &self.send_loader {
            config.loader = Some(loader.clone());
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

/// Transport over a serial port.
struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    fn open(name: &str, baud: u32) -> TpddResult<Self> {
        let port = serialport::new(name, baud)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| TpddError::Transport(format!("failed to open {name} @ {baud}: {e}")))?;
        Ok(Self { port })
    }
}

fn link_error(e: std::io::Error) -> TpddError {
    TpddError::Transport(e.to_string())
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> usize {
        match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("Serial status failed: {}", e);
                0
            }
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) -> TpddResult<()> {
        self.port.write_all(&[byte]).map_err(link_error)
    }

    fn write_all(&mut self, bytes: &[u8]) -> TpddResult<()> {
        self.port.write_all(bytes).map_err(link_error)
    }

    fn flush(&mut self) -> TpddResult<()> {
        self.port.flush().map_err(link_error)
    }
}

/// Log the visible tree below `dir`.
fn print_dir<S: Storage + ?Sized>(storage: &S, dir: &str, depth: usize) {
    let entries = match storage.open_directory(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", dir, e);
            return;
        }
    };
    let indent = " ".repeat(depth);
    for entry in entries.filter(|e| !e.is_hidden) {
        if entry.is_folder {
            debug!("(--------) {}{}/", indent, entry.name);
            print_dir(storage, &format!("{}{}/", dir, entry.name), depth + 1);
        } else {
            debug!("({:8}) {}{}", entry.size, indent, entry.name);
        }
    }
}

/// Run the drive until Ctrl-C.
async fn serve<S: Storage + 'static>(
    mut link: SerialTransport,
    mut storage: S,
    config: DriveConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    storage.mount()?;
    if log::log_enabled!(log::Level::Debug) {
        print_dir(&storage, "/", 0);
    }

    if let Some(loader) = &config.loader {
        send_loader(&mut link, &mut storage, loader, config.loader_delay())?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    // Spawn emulator in blocking task
    let emu_handle = tokio::task::spawn_blocking(move || {
        let mut emu = Emulator::with_config(link, storage, &config);
        emu.run(&flag)
    });

    let ctrl_c = tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
            }
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let result = emu_handle.await?;
    ctrl_c.abort();

    if let Err(e) = &result {
        error!("Drive stopped: {}", e);
    }
    Ok(result?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };
    args.apply(&mut config);

    let port = config
        .port
        .clone()
        .ok_or("no serial port given (use --port or set \"port\" in the config)")?;
    let link = SerialTransport::open(&port, config.baud)?;
    info!("Listening on {} @ {} baud", port, config.baud);

    if args.memory {
        info!("Serving an empty in-memory disk");
        serve(link, MemoryStorage::new(), config).await
    } else {
        info!("Serving {}", config.root.display());
        let storage = HostStorage::new(config.root.clone());
        serve(link, storage, config).await
    }
}
