//! Binary telegram codec for the NCore/UC protocol spoken by the ANC350.
//!
//! Every telegram is a run of little-endian 32-bit integers:
//! - `length`: byte count of everything after the length field itself
//! - `opcode`, `address`, `index`, `correlationNumber`
//! - an opcode-specific tail (`data[..]` for Set/Tell, `reason` + `data[..]`
//!   for Ack, nothing for Get)
//!
//! The length prefix is the only way to know where a reply ends, so decoding
//! is two-phase: read the prefix, validate it, then read the body.

pub mod address;
pub mod codec;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod framed;

pub use address::{Access, Parameter, Scope, SensorUnit, PARAMETERS};
pub use codec::{
    check_ack_length, check_length, decode_body, decode_telegram, encode_telegram, peek_length,
    Ack, Header, Telegram, ACK_LENGTH, HEADER_SIZE, LENGTH_FIELD_SIZE, MAX_TELEGRAM_SIZE,
};
pub use error::{Result, TelegramError};
pub use opcode::{Opcode, Reason};
pub use reader::{is_timeout, TelegramReader};
pub use writer::TelegramWriter;

#[cfg(feature = "async")]
pub use framed::TelegramCodec;
