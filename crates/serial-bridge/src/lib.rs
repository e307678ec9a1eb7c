//! # serial-bridge
//!
//! Server side of Serial-Over-IP: opens and configures one character device
//! at startup, then exposes it as a TCP endpoint, one peer connection at a
//! time. The TCP stream is a verbatim mirror of the device byte stream in
//! both directions; any protocol running over the link is the endpoints'
//! business.

pub mod listener;
pub mod server;
pub mod settings;
