//! Outbound connection to a remote bridge.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::info;

/// Errors raised while reaching the remote bridge. All of them are fatal to
/// the client: there is no reconnect loop.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Host name resolution failed.
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The name resolved to no addresses at all.
    #[error("no addresses found for {host}")]
    NoAddress { host: String },

    /// The TCP connection could not be established.
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Resolves `host:port` and connects to the first address it yields.
///
/// # Errors
///
/// Returns [`ConnectError`] if resolution yields nothing or the connection
/// is refused.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ConnectError> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ConnectError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ConnectError::NoAddress {
        host: host.to_string(),
    })?;

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ConnectError::Connect { addr, source })?;
    info!(%addr, "connected to bridge");
    Ok(stream)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
