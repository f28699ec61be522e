use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::trace;

use crate::error::Result;

const DISCARD_CHUNK_SIZE: usize = 512;

/// A connected byte stream the transaction engine can drive.
///
/// Besides plain `Read + Write`, the engine needs to bound its blocking reads
/// and to throw away unsolicited bytes before it sends a request.
pub trait Transport: Read + Write + Send {
    /// Set the timeout applied to each individual read.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Drop every byte currently buffered on the receive side without
    /// blocking. Returns the number of bytes discarded.
    fn discard_pending(&mut self) -> Result<usize>;
}

/// A connected controller stream. Implements `Read + Write`.
pub struct ControllerStream {
    inner: TcpStream,
}

impl ControllerStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the remote controller.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }
}

impl Read for ControllerStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for ControllerStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Transport for ControllerStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    fn discard_pending(&mut self) -> Result<usize> {
        self.inner.set_nonblocking(true)?;
        let mut discarded = 0usize;
        let mut chunk = [0u8; DISCARD_CHUNK_SIZE];
        let outcome = loop {
            match self.inner.read(&mut chunk) {
                // Peer closed; leave it for the next read to report.
                Ok(0) => break Ok(()),
                Ok(n) => discarded += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.inner.set_nonblocking(false)?;
        outcome?;
        if discarded > 0 {
            trace!(bytes = discarded, "discarded pending receive data");
        }
        Ok(discarded)
    }
}

impl std::fmt::Debug for ControllerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerStream")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}
