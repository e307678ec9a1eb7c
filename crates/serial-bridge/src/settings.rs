//! Process configuration: command-line flags with an optional TOML settings
//! file.
//!
//! The file supplies defaults for anything the command line leaves unset;
//! command-line flags always win. A device path and a listening port must be
//! present after merging, otherwise startup fails.
//!
//! ```toml
//! device = "/dev/ttyS0"
//! kind = "hsuart"
//! raw = true
//! port = 3001
//! bind_address = "0.0.0.0"
//! ```

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use serial_core::{DeviceConfig, DeviceKind};

/// Errors raised while assembling the bridge settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("could not read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML.
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `kind` value in the settings file was not recognized.
    #[error(transparent)]
    Kind(#[from] serial_core::device::UnknownDeviceKind),

    /// A required option is missing from both the command line and the file.
    #[error("missing required option: {0}")]
    Missing(&'static str),
}

/// Command-line options.
#[derive(Debug, Parser)]
#[command(
    name = "serial-bridge",
    about = "Expose a local serial device as a TCP endpoint"
)]
pub struct Args {
    /// Device node to bridge, e.g. /dev/ttyS0.
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Hardware setup procedure: serial, hsuart or cy8mrln.
    #[arg(short, long)]
    pub kind: Option<DeviceKind>,

    /// Disable canonical (line-buffered) input processing on the device.
    #[arg(short, long)]
    pub raw: bool,

    /// TCP port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind the listener to.
    #[arg(long)]
    pub bind_address: Option<IpAddr>,

    /// Optional TOML settings file; command-line flags take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// File-supplied defaults. Every field is optional; absent fields fall back
/// to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileSettings {
    pub device: Option<PathBuf>,
    pub kind: Option<String>,
    pub raw: Option<bool>,
    pub port: Option<u16>,
    pub bind_address: Option<IpAddr>,
}

impl FileSettings {
    /// Loads the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be read and
    /// [`SettingsError::Parse`] if it is not valid TOML.
    pub fn load(path: &PathBuf) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Fully resolved bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub device: DeviceConfig,
    pub bind_address: IpAddr,
    pub port: u16,
}

impl Args {
    /// Merges the command line with the optional settings file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file is unreadable or malformed, or
    /// if the device path or port is missing from both sources.
    pub fn into_settings(self) -> Result<BridgeSettings, SettingsError> {
        let file = match &self.config {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };
        self.merge(file)
    }

    fn merge(self, file: FileSettings) -> Result<BridgeSettings, SettingsError> {
        let path = self
            .device
            .or(file.device)
            .ok_or(SettingsError::Missing("device path (--device)"))?;
        let port = self
            .port
            .or(file.port)
            .ok_or(SettingsError::Missing("listening port (--port)"))?;

        let kind = match (self.kind, file.kind) {
            (Some(kind), _) => kind,
            (None, Some(name)) => name.parse::<DeviceKind>()?,
            (None, None) => DeviceKind::Serial,
        };

        let raw_mode = self.raw || file.raw.unwrap_or(false);
        let bind_address = self
            .bind_address
            .or(file.bind_address)
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));

        Ok(BridgeSettings {
            device: DeviceConfig {
                path,
                kind,
                raw_mode,
            },
            bind_address,
            port,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
