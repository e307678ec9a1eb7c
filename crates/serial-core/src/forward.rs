//! Readiness-multiplexed full-duplex copy loop.
//!
//! This is the shared heart of both binaries: the server runs it between the
//! device endpoint and an accepted peer, the pty client between the network
//! stream and the pty master. The loop blocks on read readiness of either
//! endpoint, moves one chunk at a time in the direction that woke up, and
//! terminates the moment either side reaches end-of-stream or fails. No data
//! is inspected, transformed, or buffered beyond the single in-flight chunk.

use tracing::{debug, trace};

use crate::endpoint::ByteEndpoint;

/// Size of the single in-flight transfer chunk, sized for a typical device
/// MTU.
pub const TRANSFER_CHUNK: usize = 4096;

/// Why a forwarding session ended.
///
/// All variants are terminal: the engine never retries. Restart policy
/// (closing the peer and accepting the next connection, or exiting) belongs
/// to the caller.
#[derive(Debug)]
pub enum TerminationReason {
    /// The first endpoint reached end-of-stream or failed.
    SourceClosed,
    /// The second endpoint reached end-of-stream or failed.
    DestinationClosed,
    /// The readiness wait itself failed.
    WaitError(std::io::Error),
}

/// Which endpoint woke the multiplexed wait.
enum Woken {
    Source,
    Destination,
}

/// Relays bytes between `source` and `destination` until either side closes
/// or errors.
///
/// Reads never move more than [`TRANSFER_CHUNK`] bytes at a time; every byte
/// read is written to the opposite endpoint, retrying short writes until the
/// whole chunk is delivered. A read of zero bytes or a read error terminates
/// with the reason naming the endpoint that went away; a failed write names
/// the endpoint that refused the data.
pub async fn run<S, D>(source: &mut S, destination: &mut D) -> TerminationReason
where
    S: ByteEndpoint + Send + Sync,
    D: ByteEndpoint + Send + Sync,
{
    let mut buf = [0u8; TRANSFER_CHUNK];

    loop {
        let woken = tokio::select! {
            ready = source.wait_readable() => match ready {
                Ok(()) => Woken::Source,
                Err(e) => return TerminationReason::WaitError(e),
            },
            ready = destination.wait_readable() => match ready {
                Ok(()) => Woken::Destination,
                Err(e) => return TerminationReason::WaitError(e),
            },
        };

        match woken {
            Woken::Source => {
                let n = match source.read_chunk(&mut buf).await {
                    Ok(0) => return TerminationReason::SourceClosed,
                    Ok(n) => n,
                    Err(e) => {
                        debug!(error = %e, "read from source failed");
                        return TerminationReason::SourceClosed;
                    }
                };
                trace!(bytes = n, "source -> destination");
                if let Err(e) = destination.write_chunk(&buf[..n]).await {
                    debug!(error = %e, "write to destination failed");
                    return TerminationReason::DestinationClosed;
                }
            }
            Woken::Destination => {
                let n = match destination.read_chunk(&mut buf).await {
                    Ok(0) => return TerminationReason::DestinationClosed,
                    Ok(n) => n,
                    Err(e) => {
                        debug!(error = %e, "read from destination failed");
                        return TerminationReason::DestinationClosed;
                    }
                };
                trace!(bytes = n, "destination -> source");
                if let Err(e) = source.write_chunk(&buf[..n]).await {
                    debug!(error = %e, "write to source failed");
                    return TerminationReason::SourceClosed;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
