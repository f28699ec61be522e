use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TelegramError};
use crate::opcode::{Opcode, Reason};

/// Size of the length prefix.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Header: length + opcode + address + index + correlationNumber = 20 bytes.
pub const HEADER_SIZE: usize = 20;

/// Declared length of an Ack carrying a single data word.
///
/// Replies whose prefix does not fit any layout are read as this size.
pub const ACK_LENGTH: i32 = 24;

/// Maximum telegram size including the length field (`UC_MAXSIZE`).
pub const MAX_TELEGRAM_SIZE: usize = 512;

const WORD: usize = 4;
// Header bytes after the length field.
const HEADER_BODY: usize = HEADER_SIZE - LENGTH_FIELD_SIZE;

/// Fields shared by every telegram apart from the length and opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Logical parameter id.
    pub address: i32,
    /// Sub-index: axis or trigger number, 0 for controller-global objects.
    pub index: i32,
    /// Transaction id echoed by the reply; 0 means "don't care".
    pub correlation: i32,
}

impl Header {
    pub fn new(address: i32, index: i32) -> Self {
        Self {
            address,
            index,
            correlation: 0,
        }
    }
}

/// Reply to a Get or Set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub header: Header,
    /// Raw reason code, see [`Reason`].
    pub reason: i32,
    pub data: Vec<i32>,
}

impl Ack {
    pub fn reason(&self) -> Reason {
        Reason::from_code(self.reason)
    }

    /// First data word, the value for single-word objects.
    pub fn value(&self) -> Option<i32> {
        self.data.first().copied()
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Telegram {
    Get(Header),
    Set { header: Header, data: Vec<i32> },
    Ack(Ack),
    Tell { header: Header, data: Vec<i32> },
}

impl Telegram {
    /// A Get request with correlation 0.
    pub fn get(address: i32, index: i32) -> Self {
        Self::Get(Header::new(address, index))
    }

    /// A single-word Set request with correlation 0.
    pub fn set(address: i32, index: i32, value: i32) -> Self {
        Self::Set {
            header: Header::new(address, index),
            data: vec![value],
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Get(_) => Opcode::Get,
            Self::Set { .. } => Opcode::Set,
            Self::Ack(_) => Opcode::Ack,
            Self::Tell { .. } => Opcode::Tell,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Self::Get(header) | Self::Set { header, .. } | Self::Tell { header, .. } => header,
            Self::Ack(ack) => &ack.header,
        }
    }

    fn header_mut(&mut self) -> &mut Header {
        match self {
            Self::Get(header) | Self::Set { header, .. } | Self::Tell { header, .. } => header,
            Self::Ack(ack) => &mut ack.header,
        }
    }

    pub fn correlation(&self) -> i32 {
        self.header().correlation
    }

    /// Replace the correlation number.
    pub fn with_correlation(mut self, correlation: i32) -> Self {
        self.header_mut().correlation = correlation;
        self
    }

    /// Value of the `length` field: bytes after the length field.
    pub fn declared_length(&self) -> usize {
        let tail = match self {
            Self::Get(_) => 0,
            Self::Set { data, .. } | Self::Tell { data, .. } => data.len() * WORD,
            Self::Ack(ack) => WORD + ack.data.len() * WORD,
        };
        HEADER_BODY + tail
    }

    /// Total bytes on the wire.
    pub fn wire_size(&self) -> usize {
        LENGTH_FIELD_SIZE + self.declared_length()
    }

    /// Consume into the Ack payload, if this is one.
    pub fn into_ack(self) -> Option<Ack> {
        match self {
            Self::Ack(ack) => Some(ack),
            _ => None,
        }
    }
}

/// Encode a telegram into the wire format.
///
/// Wire format (all fields i32 little-endian):
/// ```text
/// ┌────────┬────────┬─────────┬───────┬─────────────┬──────────────────────┐
/// │ length │ opcode │ address │ index │ correlation │ tail                 │
/// │        │        │         │       │             │ Get:  -              │
/// │        │        │         │       │             │ Set:  data[..]       │
/// │        │        │         │       │             │ Ack:  reason data[..]│
/// │        │        │         │       │             │ Tell: data[..]       │
/// └────────┴────────┴─────────┴───────┴─────────────┴──────────────────────┘
/// ```
pub fn encode_telegram(telegram: &Telegram, dst: &mut BytesMut) -> Result<()> {
    let size = telegram.wire_size();
    if size > MAX_TELEGRAM_SIZE {
        return Err(TelegramError::TooLarge {
            size,
            max: MAX_TELEGRAM_SIZE,
        });
    }

    let header = telegram.header();
    dst.reserve(size);
    dst.put_i32_le(telegram.declared_length() as i32);
    dst.put_i32_le(telegram.opcode().code());
    dst.put_i32_le(header.address);
    dst.put_i32_le(header.index);
    dst.put_i32_le(header.correlation);

    match telegram {
        Telegram::Get(_) => {}
        Telegram::Set { data, .. } | Telegram::Tell { data, .. } => {
            data.iter().for_each(|word| dst.put_i32_le(*word));
        }
        Telegram::Ack(ack) => {
            dst.put_i32_le(ack.reason);
            ack.data.iter().for_each(|word| dst.put_i32_le(*word));
        }
    }
    Ok(())
}

/// Phase one: the declared length, once at least the prefix is available.
pub fn peek_length(src: &[u8]) -> Option<i32> {
    let prefix: [u8; LENGTH_FIELD_SIZE] = src.get(..LENGTH_FIELD_SIZE)?.try_into().ok()?;
    Some(i32::from_le_bytes(prefix))
}

/// Validate a declared length against every telegram layout.
///
/// Plausible lengths hold at least the header, are whole words, and keep
/// the telegram within [`MAX_TELEGRAM_SIZE`].
pub fn check_length(declared: i32) -> Result<usize> {
    let Ok(len) = usize::try_from(declared) else {
        return Err(TelegramError::ImplausibleLength { declared });
    };
    if len < HEADER_BODY || len % WORD != 0 || len + LENGTH_FIELD_SIZE > MAX_TELEGRAM_SIZE {
        return Err(TelegramError::ImplausibleLength { declared });
    }
    Ok(len)
}

/// Validate a declared length for an expected Ack.
///
/// An Ack is never shorter than [`ACK_LENGTH`].
pub fn check_ack_length(declared: i32) -> Result<usize> {
    let len = check_length(declared)?;
    if declared < ACK_LENGTH {
        return Err(TelegramError::ImplausibleLength { declared });
    }
    Ok(len)
}

/// Phase two: decode the bytes that follow the length field.
pub fn decode_body(body: &[u8]) -> Result<Telegram> {
    let declared = i32::try_from(body.len()).unwrap_or(i32::MAX);
    if body.len() < HEADER_BODY || body.len() % WORD != 0 {
        return Err(TelegramError::ImplausibleLength { declared });
    }

    let mut src = body;
    let opcode_code = src.get_i32_le();
    let header = Header {
        address: src.get_i32_le(),
        index: src.get_i32_le(),
        correlation: src.get_i32_le(),
    };
    let opcode = Opcode::from_code(opcode_code).ok_or(TelegramError::UnknownOpcode(opcode_code))?;

    let telegram = match opcode {
        Opcode::Get => {
            if src.has_remaining() {
                return Err(TelegramError::ImplausibleLength { declared });
            }
            Telegram::Get(header)
        }
        Opcode::Set | Opcode::Tell => {
            if !src.has_remaining() {
                return Err(TelegramError::ImplausibleLength { declared });
            }
            let data = read_words(&mut src);
            if opcode == Opcode::Set {
                Telegram::Set { header, data }
            } else {
                Telegram::Tell { header, data }
            }
        }
        Opcode::Ack => {
            if src.remaining() < WORD {
                return Err(TelegramError::ImplausibleLength { declared });
            }
            let reason = src.get_i32_le();
            Telegram::Ack(Ack {
                header,
                reason,
                data: read_words(&mut src),
            })
        }
    };
    Ok(telegram)
}

fn read_words(src: &mut &[u8]) -> Vec<i32> {
    let mut words = Vec::with_capacity(src.remaining() / WORD);
    while src.remaining() >= WORD {
        words.push(src.get_i32_le());
    }
    words
}

/// Decode one telegram from a streaming buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete telegram yet.
/// On success, consumes the telegram bytes from the buffer. A stream has no
/// way to resynchronise, so an implausible length is an error here.
pub fn decode_telegram(src: &mut BytesMut) -> Result<Option<Telegram>> {
    let Some(declared) = peek_length(src) else {
        return Ok(None);
    };
    let len = check_length(declared)?;

    let total = LENGTH_FIELD_SIZE + len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_FIELD_SIZE);
    let body = src.split_to(len);
    decode_body(&body).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(address: i32, index: i32, correlation: i32) -> Header {
        Header {
            address,
            index,
            correlation,
        }
    }

    fn roundtrip(telegram: &Telegram) -> Telegram {
        let mut buf = BytesMut::new();
        encode_telegram(telegram, &mut buf).unwrap();
        assert_eq!(buf.len(), telegram.wire_size());
        let decoded = decode_telegram(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        decoded
    }

    #[test]
    fn test_get_layout() {
        let mut buf = BytesMut::new();
        let get = Telegram::get(0x0404, 2).with_correlation(7);
        encode_telegram(&get, &mut buf).unwrap();

        let expected: Vec<u8> = [16, 1, 0x0404, 2, 7]
            .iter()
            .flat_map(|w: &i32| w.to_le_bytes())
            .collect();
        assert_eq!(buf.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_set_declares_twenty_bytes() {
        let set = Telegram::set(0x0408, 0, 125_000);
        assert_eq!(set.declared_length(), 20);
        assert_eq!(set.wire_size(), 24);
    }

    #[test]
    fn test_single_word_ack_declares_canonical_length() {
        let ack = Telegram::Ack(Ack {
            header: header(0x0404, 0, 7),
            reason: 0,
            data: vec![0x0801],
        });
        assert_eq!(ack.declared_length(), ACK_LENGTH as usize);
    }

    #[test]
    fn test_roundtrip_each_opcode() {
        let telegrams = [
            Telegram::get(0x0415, 1).with_correlation(10_000),
            Telegram::Set {
                header: header(0x0530, 4, 3),
                data: vec![-1, 2, i32::MAX],
            },
            Telegram::Ack(Ack {
                header: header(0x0407, 0, 42),
                reason: 2,
                data: vec![25_000],
            }),
            Telegram::Tell {
                header: header(0x0415, 2, 0),
                data: vec![i32::MIN],
            },
        ];
        for telegram in &telegrams {
            assert_eq!(&roundtrip(telegram), telegram);
        }
    }

    #[test]
    fn test_decode_ack_scenario_bytes() {
        let words: [i32; 7] = [24, 3, 0x0404, 0, 7, 0, 0x0801];
        let mut buf: BytesMut = words.iter().flat_map(|w| w.to_le_bytes()).collect();

        let ack = decode_telegram(&mut buf).unwrap().unwrap().into_ack().unwrap();
        assert_eq!(ack.header, header(0x0404, 0, 7));
        assert_eq!(ack.reason(), Reason::Ok);
        assert_eq!(ack.value(), Some(0x0801));
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[24u8, 0, 0][..]);
        assert!(decode_telegram(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_telegram(&Telegram::set(0x0408, 0, 5), &mut buf).unwrap();
        buf.truncate(10);
        assert!(decode_telegram(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_peek_then_finish() {
        let mut buf = BytesMut::new();
        let ack = Telegram::Ack(Ack {
            header: header(0x0415, 1, 9),
            reason: 0,
            data: vec![125_000],
        });
        encode_telegram(&ack, &mut buf).unwrap();

        let declared = peek_length(&buf[..LENGTH_FIELD_SIZE]).unwrap();
        let len = check_ack_length(declared).unwrap();
        let decoded = decode_body(&buf[LENGTH_FIELD_SIZE..LENGTH_FIELD_SIZE + len]).unwrap();
        assert_eq!(decoded, ack);
    }

    #[test]
    fn test_check_length_rejects_implausible_values() {
        for declared in [-4, 0, 12, 18, 509, 4096] {
            assert!(
                matches!(
                    check_length(declared),
                    Err(TelegramError::ImplausibleLength { .. })
                ),
                "{declared} should be rejected"
            );
        }
        assert_eq!(check_length(16).unwrap(), 16);
        assert_eq!(check_length(508).unwrap(), 508);
    }

    #[test]
    fn test_check_ack_length_requires_reason_and_data() {
        assert!(check_ack_length(16).is_err());
        assert!(check_ack_length(20).is_err());
        assert_eq!(check_ack_length(24).unwrap(), 24);
        assert_eq!(check_ack_length(32).unwrap(), 32);
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let words: [i32; 5] = [16, 2, 0x0404, 0, 1];
        let mut buf: BytesMut = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert!(matches!(
            decode_telegram(&mut buf),
            Err(TelegramError::UnknownOpcode(2))
        ));
    }

    #[test]
    fn test_decode_get_with_trailing_data_rejected() {
        let words: [i32; 5] = [1, 0x0404, 0, 1, 99];
        let body: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert!(matches!(
            decode_body(&body),
            Err(TelegramError::ImplausibleLength { declared: 20 })
        ));
    }

    #[test]
    fn test_encode_too_large() {
        let set = Telegram::Set {
            header: Header::new(0x0408, 0),
            data: vec![0; 128],
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_telegram(&set, &mut buf),
            Err(TelegramError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_multiple_telegrams() {
        let mut buf = BytesMut::new();
        encode_telegram(&Telegram::get(0x0404, 0).with_correlation(1), &mut buf).unwrap();
        encode_telegram(&Telegram::set(0x0408, 1, 77).with_correlation(2), &mut buf).unwrap();

        let first = decode_telegram(&mut buf).unwrap().unwrap();
        let second = decode_telegram(&mut buf).unwrap().unwrap();
        assert_eq!(first.opcode(), Opcode::Get);
        assert_eq!(first.correlation(), 1);
        assert_eq!(second, Telegram::set(0x0408, 1, 77).with_correlation(2));
        assert!(buf.is_empty());
    }
}
