//! Byte-stream endpoints the forwarding engine can multiplex.
//!
//! An endpoint is anything that can report read readiness, deliver one chunk
//! of bytes, and absorb a whole buffer. The readiness wait is separate from
//! the read so the engine can block on several endpoints at once and only
//! then commit to a direction.
//!
//! Implementations exist for [`tokio::net::TcpStream`] (the network peer),
//! [`tokio::net::UnixStream`] (loopback pairs in tests), and [`FdStream`]
//! (a character device or pty master registered with the reactor).

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use async_trait::async_trait;
use tokio::io::unix::AsyncFd;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixStream};

/// A full-duplex byte stream with a separately awaitable read side.
#[async_trait]
pub trait ByteEndpoint {
    /// Waits until at least one byte (or end-of-stream) can be read.
    ///
    /// Does not consume any data; a subsequent [`read_chunk`] resolves
    /// immediately.
    ///
    /// [`read_chunk`]: ByteEndpoint::read_chunk
    async fn wait_readable(&self) -> io::Result<()>;

    /// Reads up to `buf.len()` bytes. `Ok(0)` means end-of-stream.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `buf`, retrying short writes until everything is on
    /// the wire or an error occurs.
    async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()>;
}

#[async_trait]
impl ByteEndpoint for TcpStream {
    async fn wait_readable(&self) -> io::Result<()> {
        TcpStream::readable(self).await
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            TcpStream::readable(self).await?;
            match self.try_read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                result => return result,
            }
        }
    }

    async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf).await
    }
}

#[async_trait]
impl ByteEndpoint for UnixStream {
    async fn wait_readable(&self) -> io::Result<()> {
        UnixStream::readable(self).await
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            UnixStream::readable(self).await?;
            match self.try_read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                result => return result,
            }
        }
    }

    async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf).await
    }
}

// ── Raw-fd endpoint ───────────────────────────────────────────────────────────

/// A character device, pty master, or other raw fd registered with the tokio
/// reactor and driven through readiness notifications.
///
/// The fd is switched to non-blocking mode on construction and owned for the
/// lifetime of the stream.
#[derive(Debug)]
pub struct FdStream {
    inner: AsyncFd<OwnedFd>,
}

impl FdStream {
    /// Takes ownership of `fd`, makes it non-blocking, and registers it with
    /// the current reactor.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the fcntl calls or the reactor
    /// registration fail.
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        set_nonblocking(fd.as_raw_fd())?;
        Ok(Self {
            inner: AsyncFd::new(fd)?,
        })
    }
}

impl AsRawFd for FdStream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.get_ref().as_raw_fd()
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let rv = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rv == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[async_trait]
impl ByteEndpoint for FdStream {
    async fn wait_readable(&self) -> io::Result<()> {
        // Dropping the guard without clearing readiness keeps the wakeup
        // for the read that follows.
        self.inner.readable().await.map(|_guard| ())
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;
            let fd = self.inner.get_ref().as_raw_fd();
            match guard.try_io(|_| {
                let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            }) {
                Ok(result) => return result,
                // Spurious readiness; it was cleared, wait again.
                Err(_would_block) => continue,
            }
        }
    }

    async fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let mut guard = self.inner.writable().await?;
            let fd = self.inner.get_ref().as_raw_fd();
            let remaining = &buf[written..];
            match guard.try_io(|_| {
                let n = unsafe { libc::write(fd, remaining.as_ptr().cast(), remaining.len()) };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            }) {
                Ok(result) => written += result?,
                Err(_would_block) => continue,
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::FromRawFd;
    use tokio_test::assert_ok;

    /// Allocates a plain pipe and returns (read end, write end).
    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0 as libc::c_int; 2];
        let rv = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rv, 0, "pipe(2) failed");
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[tokio::test]
    async fn test_fd_stream_makes_the_fd_non_blocking() {
        let (read_end, _write_end) = pipe();
        let stream = tokio_test::assert_ok!(FdStream::new(read_end));

        let flags = unsafe { libc::fcntl(stream.as_raw_fd(), libc::F_GETFL) };
        assert_ne!(flags & libc::O_NONBLOCK, 0);
    }

    #[tokio::test]
    async fn test_fd_stream_reads_what_was_written_into_the_pipe() {
        let (read_end, write_end) = pipe();
        let mut stream = FdStream::new(read_end).unwrap();

        let payload = b"scan frame 0001";
        let n = unsafe {
            libc::write(
                write_end.as_raw_fd(),
                payload.as_ptr().cast(),
                payload.len(),
            )
        };
        assert_eq!(n, payload.len() as isize);

        let mut buf = [0u8; 64];
        stream.wait_readable().await.unwrap();
        let read = stream.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..read], payload);
    }

    #[tokio::test]
    async fn test_fd_stream_sees_end_of_stream_when_writer_closes() {
        let (read_end, write_end) = pipe();
        let mut stream = FdStream::new(read_end).unwrap();
        drop(write_end);

        let mut buf = [0u8; 16];
        let read = stream.read_chunk(&mut buf).await.unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn test_fd_stream_write_chunk_delivers_everything() {
        let (read_end, write_end) = pipe();
        let mut stream = FdStream::new(write_end).unwrap();

        let payload = vec![0xA5u8; 4096];
        stream.write_chunk(&payload).await.unwrap();

        let mut got = vec![0u8; 4096];
        let mut off = 0;
        while off < got.len() {
            let n = unsafe {
                libc::read(
                    read_end.as_raw_fd(),
                    got[off..].as_mut_ptr().cast(),
                    got.len() - off,
                )
            };
            assert!(n > 0);
            off += n as usize;
        }
        assert_eq!(got, payload);
    }
}
