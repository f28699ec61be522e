use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_telegram, Telegram, MAX_TELEGRAM_SIZE};
use crate::error::{Result, TelegramError};

/// Writes complete telegrams to any `Write` stream.
///
/// A telegram goes out in a single `write` call. The controller treats a
/// split request as two malformed ones, so a short write is reported as
/// [`TelegramError::ShortWrite`] instead of being continued.
pub struct TelegramWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> TelegramWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_TELEGRAM_SIZE),
        }
    }

    /// Encode and send one telegram, then flush.
    pub fn send(&mut self, telegram: &Telegram) -> Result<()> {
        self.buf.clear();
        encode_telegram(telegram, &mut self.buf)?;

        loop {
            match self.inner.write(&self.buf) {
                Ok(0) => return Err(TelegramError::ConnectionClosed),
                Ok(n) if n == self.buf.len() => break,
                Ok(n) => {
                    return Err(TelegramError::ShortWrite {
                        expected: self.buf.len(),
                        written: n,
                    })
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TelegramError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TelegramError::Io(err)),
            }
        }
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

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    /// Accepts at most `limit` bytes per write.
    struct Limited {
        written: Vec<u8>,
        limit: usize,
        interrupt_first: bool,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interrupt_first {
                self.interrupt_first = false;
                return Err(io::ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sends_whole_telegram_in_one_write() {
        let mut writer = TelegramWriter::new(Vec::new());
        writer
            .send(&Telegram::get(0x0404, 2).with_correlation(77))
            .unwrap();
        let wire = writer.into_inner();
        assert_eq!(wire.len(), 20);
        assert_eq!(&wire[..4], &16i32.to_le_bytes());
        assert_eq!(&wire[16..], &77i32.to_le_bytes());
    }

    #[test]
    fn short_write_is_an_error() {
        let mut writer = TelegramWriter::new(Limited {
            written: Vec::new(),
            limit: 8,
            interrupt_first: false,
        });
        let err = writer.send(&Telegram::set(0x0408, 0, 1)).unwrap_err();
        assert!(matches!(
            err,
            TelegramError::ShortWrite {
                expected: 24,
                written: 8
            }
        ));
    }

    #[test]
    fn zero_write_means_closed() {
        let mut writer = TelegramWriter::new(Limited {
            written: Vec::new(),
            limit: 0,
            interrupt_first: false,
        });
        assert!(matches!(
            writer.send(&Telegram::get(0x0404, 0)),
            Err(TelegramError::ConnectionClosed)
        ));
    }

    #[test]
    fn interrupted_write_is_retried() {
        let mut writer = TelegramWriter::new(Limited {
            written: Vec::new(),
            limit: usize::MAX,
            interrupt_first: true,
        });
        writer.send(&Telegram::get(0x0404, 0)).unwrap();
        assert_eq!(writer.get_ref().written.len(), 20);
    }
}
