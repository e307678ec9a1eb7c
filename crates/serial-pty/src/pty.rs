//! Pseudo-terminal allocation: the local stand-in for the remote device.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;

use thiserror::Error;

use serial_core::FdStream;

/// Errors raised while allocating the pty pair.
#[derive(Debug, Error)]
pub enum PtyError {
    /// `openpty(3)` failed.
    #[error("openpty failed: {0}")]
    Allocate(#[source] io::Error),

    /// The follower device path could not be resolved.
    #[error("could not resolve pty follower path: {0}")]
    Name(#[source] io::Error),

    /// The master fd could not be registered with the async reactor.
    #[error("failed to register pty master with the async reactor: {0}")]
    Reactor(#[source] io::Error),
}

/// An allocated pseudo-terminal pair.
///
/// The master side is wrapped for forwarding; the follower fd is held open so
/// the master does not observe end-of-stream before an external program has
/// attached to the follower path.
pub struct Pty {
    master: FdStream,
    follower_path: PathBuf,
    _follower: OwnedFd,
}

impl Pty {
    /// Allocates a fresh master/follower pair.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PtyError`] if allocation, path resolution, or reactor
    /// registration fails.
    pub fn allocate() -> Result<Self, PtyError> {
        let mut master_fd: libc::c_int = -1;
        let mut follower_fd: libc::c_int = -1;
        let rv = unsafe {
            libc::openpty(
                &mut master_fd,
                &mut follower_fd,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if rv != 0 {
            return Err(PtyError::Allocate(io::Error::last_os_error()));
        }
        let master = unsafe { OwnedFd::from_raw_fd(master_fd) };
        let follower = unsafe { OwnedFd::from_raw_fd(follower_fd) };

        let follower_path = follower_name(&master)?;
        let master = FdStream::new(master).map_err(PtyError::Reactor)?;

        Ok(Self {
            master,
            follower_path,
            _follower: follower,
        })
    }

    /// Path of the follower device, e.g. `/dev/pts/4`. This is what the
    /// operator points their terminal program at.
    pub fn follower_path(&self) -> &std::path::Path {
        &self.follower_path
    }

    /// The master endpoint to hand to the forwarding engine.
    pub fn master_mut(&mut self) -> &mut FdStream {
        &mut self.master
    }
}

fn follower_name(master: &OwnedFd) -> Result<PathBuf, PtyError> {
    let mut buf = [0 as libc::c_char; 128];
    let rv = unsafe { libc::ptsname_r(master.as_raw_fd(), buf.as_mut_ptr(), buf.len()) };
    if rv != 0 {
        return Err(PtyError::Name(io::Error::from_raw_os_error(rv)));
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
