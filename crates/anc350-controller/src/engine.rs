use std::sync::Arc;

use anc350_telegram::{
    check_ack_length, decode_body, Ack, Telegram, TelegramError, TelegramReader, TelegramWriter,
    ACK_LENGTH, LENGTH_FIELD_SIZE,
};
use anc350_transport::Transport;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::correlation::CorrelationAllocator;
use crate::error::{ControllerError, Result};

/// Drives single request/reply exchanges over a controller link.
///
/// The engine does no locking of its own. Callers must hold exclusive
/// access to the link for the whole of [`execute`](Self::execute), which is
/// what `&mut T` enforces.
#[derive(Debug)]
pub struct TransactionEngine {
    config: EngineConfig,
    correlation: Arc<CorrelationAllocator>,
}

impl TransactionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_allocator(config, Arc::new(CorrelationAllocator::new()))
    }

    /// Share a correlation allocator with other engines.
    pub fn with_allocator(config: EngineConfig, correlation: Arc<CorrelationAllocator>) -> Self {
        Self {
            config,
            correlation,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn correlation(&self) -> &Arc<CorrelationAllocator> {
        &self.correlation
    }

    /// Send `request` with a fresh correlation number and return the
    /// matching ack.
    ///
    /// The reason code is not interpreted here; a non-OK ack is still a
    /// completed exchange.
    ///
    /// A reply carrying another correlation number is assumed to be a
    /// straggler from an earlier exchange and earns `mismatch_retries`
    /// retries. A Get is retried by sending it again with a new correlation
    /// number. A Set is retried by reading the next reply only, so a motion
    /// command is never issued twice. When the retries run out, including
    /// by timing out, the mismatch is reported.
    pub fn execute<T: Transport>(&self, link: &mut T, request: Telegram) -> Result<Ack> {
        let resend = matches!(request, Telegram::Get(_));
        let header = *request.header();

        link.set_read_timeout(Some(self.config.read_timeout))?;
        let mut correlation = self.send(link, &request)?;

        let mut mismatch = None;
        for attempt in 0..=self.config.mismatch_retries {
            if attempt > 0 && resend {
                debug!(
                    address = header.address,
                    index = header.index,
                    attempt,
                    "resending request after mismatch"
                );
                correlation = self.send(link, &request)?;
            }

            let mut reader = TelegramReader::new(&mut *link);
            let reply = match self.read_reply(&mut reader, header.address, header.index) {
                Ok(reply) => reply,
                Err(ControllerError::Timeout { .. }) if mismatch.is_some() => break,
                Err(err) => return Err(err),
            };
            match reply {
                Telegram::Ack(ack) if ack.header.correlation == correlation => {
                    trace!(correlation, reason = ack.reason, "reply matched");
                    return Ok(ack);
                }
                other => {
                    let received = other.correlation();
                    warn!(
                        opcode = %other.opcode(),
                        expected = correlation,
                        received,
                        attempt,
                        "reply does not match request"
                    );
                    mismatch = Some(received);
                }
            }
        }

        Err(ControllerError::CorrelationMismatch {
            sent: correlation,
            received: mismatch.unwrap_or_default(),
        })
    }

    /// Discard stale input if configured, then write `request` under a new
    /// correlation number, which is returned.
    fn send<T: Transport>(&self, link: &mut T, request: &Telegram) -> Result<i32> {
        let correlation = self.correlation.next_id();
        let request = request.clone().with_correlation(correlation);
        let header = *request.header();

        if self.config.discard_before_send {
            let dropped = link.discard_pending()?;
            if dropped > 0 {
                warn!(
                    bytes = dropped,
                    address = header.address,
                    "discarded unread data before request"
                );
            }
        }

        debug!(
            opcode = %request.opcode(),
            address = header.address,
            index = header.index,
            correlation,
            "sending request"
        );
        TelegramWriter::new(&mut *link).send(&request)?;
        Ok(correlation)
    }

    fn read_reply<R: std::io::Read>(
        &self,
        reader: &mut TelegramReader<R>,
        address: i32,
        index: i32,
    ) -> Result<Telegram> {
        let timeout = |err: TelegramError| match err {
            TelegramError::Incomplete { expected, received } => ControllerError::Timeout {
                address,
                index,
                expected,
                received,
            },
            other => ControllerError::Telegram(other),
        };

        let prefix = reader
            .read_exact_bounded(LENGTH_FIELD_SIZE, self.config.prefix_attempts)
            .map_err(timeout)?;
        let declared = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

        let len = match check_ack_length(declared) {
            Ok(len) => len,
            Err(_) => {
                warn!(
                    declared,
                    assumed = ACK_LENGTH,
                    address,
                    "implausible reply length"
                );
                ACK_LENGTH as usize
            }
        };

        let body = reader
            .read_exact_bounded(len, self.config.body_attempts)
            .map_err(timeout)?;
        Ok(decode_body(&body)?)
    }
}
