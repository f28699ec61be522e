//! `tokio_util::codec` adapter for telegram streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_telegram, encode_telegram, Telegram};
use crate::error::TelegramError;

/// Telegram codec for `FramedRead`/`FramedWrite`.
///
/// Decoding is strict: an implausible length prefix is an error because an
/// async stream has no request to resynchronise against.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelegramCodec;

impl Decoder for TelegramCodec {
    type Item = Telegram;
    type Error = TelegramError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_telegram(src)
    }
}

impl Encoder<Telegram> for TelegramCodec {
    type Error = TelegramError;

    fn encode(&mut self, item: Telegram, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_telegram(&item, dst)
    }
}

impl Encoder<&Telegram> for TelegramCodec {
    type Error = TelegramError;

    fn encode(&mut self, item: &Telegram, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_telegram(item, dst)
    }
}
