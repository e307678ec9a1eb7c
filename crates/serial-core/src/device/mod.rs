//! Character-device handling: kind selection, open semantics, and the
//! one-shot hardware setup applied before any forwarding starts.
//!
//! A device endpoint is created exactly once per process by [`open_device`]:
//! open the node, push the kind's operating parameters through its setup
//! procedure, then register the fd with the async reactor. The resulting
//! [`FdStream`] lives for the rest of the process and is reused across
//! sessions; only peer connections come and go.

pub mod control;
pub mod setup;

use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::endpoint::FdStream;
use control::FdControl;

/// Which hardware setup procedure to run on the opened device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Plain UART programmed through termios.
    Serial,
    /// Qualcomm high-speed UART (webOS `hsuart` driver) programmed via ioctl.
    HsUart,
    /// CY8MRLN touch panel controller; delivers a read-only scan stream.
    Cy8mrln,
}

/// Error for an unrecognized `--kind` value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown device kind `{0}` (expected serial, hsuart or cy8mrln)")]
pub struct UnknownDeviceKind(String);

impl FromStr for DeviceKind {
    type Err = UnknownDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(DeviceKind::Serial),
            "hsuart" => Ok(DeviceKind::HsUart),
            "cy8mrln" => Ok(DeviceKind::Cy8mrln),
            other => Err(UnknownDeviceKind(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceKind::Serial => "serial",
            DeviceKind::HsUart => "hsuart",
            DeviceKind::Cy8mrln => "cy8mrln",
        };
        f.write_str(s)
    }
}

impl DeviceKind {
    /// Whether the device node is opened for writing as well as reading.
    ///
    /// The touch controller only ever produces data; the UARTs carry
    /// traffic in both directions.
    pub fn writable(self) -> bool {
        !matches!(self, DeviceKind::Cy8mrln)
    }
}

/// Immutable description of the device to bridge, fixed at startup.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Path of the device node, e.g. `/dev/ttyS0`.
    pub path: PathBuf,
    /// Setup procedure and open mode to use.
    pub kind: DeviceKind,
    /// Disable canonical (line-buffered) input processing. Only meaningful
    /// for [`DeviceKind::Serial`].
    pub raw_mode: bool,
}

/// Errors raised while opening and preparing the device endpoint.
///
/// All of these are startup preconditions: callers report them and exit,
/// they are never retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device node could not be opened.
    #[error("failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A setup operation (termios or ioctl) failed.
    #[error("device setup failed: {0}")]
    Setup(#[source] io::Error),

    /// The fd could not be registered with the async reactor.
    #[error("failed to register device with the async reactor: {0}")]
    Reactor(#[source] io::Error),
}

/// Opens the device node described by `config` and runs its one-shot setup
/// procedure, returning the endpoint the forwarding loop will use.
///
/// Must be called from within a tokio runtime (the fd is registered with the
/// current reactor).
///
/// # Errors
///
/// Returns [`DeviceError`] if the node cannot be opened, any setup operation
/// fails, or reactor registration fails.
pub fn open_device(config: &DeviceConfig) -> Result<FdStream, DeviceError> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(config.kind.writable())
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(&config.path)
        .map_err(|source| DeviceError::Open {
            path: config.path.clone(),
            source,
        })?;

    let mut ctl = FdControl::new(file.as_raw_fd());
    setup::procedure_for(config.kind)
        .apply(&mut ctl, config.raw_mode)
        .map_err(DeviceError::Setup)?;

    info!(path = %config.path.display(), kind = %config.kind, "device configured");

    let fd = OwnedFd::from(file);
    FdStream::new(fd).map_err(DeviceError::Reactor)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
