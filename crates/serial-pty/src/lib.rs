//! # serial-pty
//!
//! Client side of Serial-Over-IP: connects to a remote bridge, allocates a
//! pseudo-terminal pair, and mirrors the network stream onto the pty master.
//! Whatever program opens the reported follower path talks to the remote
//! device as if it were local. Exactly one session per invocation.

pub mod pty;
pub mod remote;
