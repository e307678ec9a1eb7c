//! TCP listening endpoint: binds once, then admits one peer at a time.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::info;

/// Errors from the listening side of the bridge.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// An accept attempt failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// A bound listening socket serializing one session at a time.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Binds `addr` with address reuse enabled, so a restarted bridge can
    /// take the port back immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] if the socket cannot be created,
    /// configured, bound, or put into the listening state.
    pub fn bind(addr: SocketAddr) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { addr, source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        // Sessions are strictly serialized; a backlog of one is enough.
        let inner = socket.listen(1).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;
        info!(addr = %local_addr, "listening");

        Ok(Self { inner, local_addr })
    }

    /// The address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Blocks until the next peer connects.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Accept`] if the accept call fails.
    pub async fn accept_next(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        self.inner.accept().await.map_err(ListenerError::Accept)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
