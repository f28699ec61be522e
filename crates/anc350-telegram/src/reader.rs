use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_telegram, Telegram, MAX_TELEGRAM_SIZE};
use crate::error::{Result, TelegramError};

const READ_CHUNK_SIZE: usize = MAX_TELEGRAM_SIZE;

/// Reads telegrams from any `Read` stream.
///
/// Two styles are offered. [`read_exact_bounded`](Self::read_exact_bounded)
/// reads an exact byte count within a budget of timed-out reads, which is
/// what the request/response engine needs on a socket with a short read
/// timeout. [`read_telegram`](Self::read_telegram) blocks until a complete
/// telegram is buffered.
pub struct TelegramReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> TelegramReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_TELEGRAM_SIZE),
        }
    }

    /// Read exactly `len` bytes.
    ///
    /// A read that times out (`WouldBlock`/`TimedOut`) without delivering
    /// anything uses one of `attempts`; reads that make progress are free, so
    /// a reply split into many small segments still completes. When the
    /// budget runs out, returns [`TelegramError::Incomplete`] with the count
    /// received so far. Never reads past `len`.
    pub fn read_exact_bounded(&mut self, len: usize, attempts: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        let buffered = self.buf.len().min(len);
        out.extend_from_slice(&self.buf.split_to(buffered));

        let mut remaining_attempts = attempts.max(1);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while out.len() < len {
            let want = (len - out.len()).min(READ_CHUNK_SIZE);
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => return Err(TelegramError::ConnectionClosed),
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => {
                    remaining_attempts -= 1;
                    trace!(
                        expected = len,
                        received = out.len(),
                        remaining_attempts,
                        "telegram read timed out"
                    );
                    if remaining_attempts == 0 {
                        return Err(TelegramError::Incomplete {
                            expected: len,
                            received: out.len(),
                        });
                    }
                }
                Err(err) => return Err(TelegramError::Io(err)),
            }
        }
        Ok(out)
    }

    /// Read the next complete telegram (blocking).
    ///
    /// Returns `Err(TelegramError::ConnectionClosed)` when EOF is reached.
    pub fn read_telegram(&mut self) -> Result<Telegram> {
        loop {
            if let Some(telegram) = decode_telegram(&mut self.buf)? {
                return Ok(telegram);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TelegramError::Io(err)),
            };

            if read == 0 {
                return Err(TelegramError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes read from the stream but not yet returned.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Whether an I/O error is a read timeout rather than a failure.
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
