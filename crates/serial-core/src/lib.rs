//! # serial-core
//!
//! Shared library for Serial-Over-IP containing the device setup procedures,
//! the async endpoint plumbing, and the forwarding engine.
//!
//! This crate is used by both the server bridge (`serial-bridge`) and the
//! pty client (`serial-pty`). It defines:
//!
//! - **`device`** – Which kind of character device is being bridged, how it
//!   is opened, and the one-shot hardware setup pushed to it before any
//!   forwarding starts.
//!
//! - **`endpoint`** – The [`ByteEndpoint`] abstraction the engine multiplexes
//!   over: TCP streams, Unix sockets, and raw file descriptors registered
//!   with the tokio reactor ([`FdStream`]).
//!
//! - **`forward`** – The readiness-multiplexed full-duplex copy loop. Both
//!   binaries hand it two endpoints and get back the reason the session
//!   ended; everything else (reconnecting, exiting) is their policy.

pub mod device;
pub mod endpoint;
pub mod forward;

pub use device::{open_device, DeviceConfig, DeviceError, DeviceKind};
pub use endpoint::{ByteEndpoint, FdStream};
pub use forward::{TerminationReason, TRANSFER_CHUNK};
