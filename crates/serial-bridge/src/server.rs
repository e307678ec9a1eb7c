//! Accept loop and per-session forwarding.
//!
//! The device endpoint is owned by the caller and lives across sessions;
//! each accepted peer connection is owned by exactly one [`Session`] and is
//! closed when that session ends. Sessions are strictly serialized, so the
//! device is never touched by two sessions at once and no locking exists.

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::info;
use uuid::Uuid;

use serial_core::forward;
use serial_core::{ByteEndpoint, TerminationReason};

use crate::listener::{Listener, ListenerError};

/// One full-duplex forwarding episode between the device endpoint and a
/// connected peer.
pub struct Session {
    id: Uuid,
    peer_addr: SocketAddr,
}

impl Session {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
        }
    }

    /// Forwards between the device and the peer until either side closes,
    /// then drops (closes) the peer connection. The device endpoint is
    /// returned to the caller untouched.
    pub async fn run<D>(&self, device: &mut D, mut peer: TcpStream) -> TerminationReason
    where
        D: ByteEndpoint + Send + Sync,
    {
        info!(session = %self.id, peer = %self.peer_addr, "session started");
        let reason = forward::run(device, &mut peer).await;
        match &reason {
            TerminationReason::SourceClosed => {
                info!(session = %self.id, "device side closed the session");
            }
            TerminationReason::DestinationClosed => {
                info!(session = %self.id, "peer disconnected");
            }
            TerminationReason::WaitError(e) => {
                info!(session = %self.id, error = %e, "readiness wait failed");
            }
        }
        reason
    }
}

/// Accepts peers forever, one session at a time.
///
/// There is no shutdown path other than process termination; a new session
/// is admitted as soon as the previous one has ended and its peer connection
/// has been closed.
///
/// # Errors
///
/// Returns [`ListenerError::Accept`] if the accept call itself fails; the
/// caller treats that as fatal.
pub async fn serve<D>(device: &mut D, listener: &Listener) -> Result<(), ListenerError>
where
    D: ByteEndpoint + Send + Sync,
{
    loop {
        let (peer, peer_addr) = listener.accept_next().await?;
        info!(%peer_addr, "peer connected");
        Session::new(peer_addr).run(device, peer).await;
    }
}
