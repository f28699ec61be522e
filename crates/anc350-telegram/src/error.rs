/// Errors that can occur during telegram encoding, decoding, and I/O.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The declared length does not fit any telegram layout.
    #[error("implausible telegram length {declared}")]
    ImplausibleLength { declared: i32 },

    /// The opcode field holds a value outside SET/GET/ACK/TELL.
    #[error("unknown opcode {0}")]
    UnknownOpcode(i32),

    /// The encoded telegram would exceed the controller's maximum size.
    #[error("telegram too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// A bounded read ran out of attempts before the expected bytes arrived.
    #[error("incomplete read ({received} of {expected} bytes)")]
    Incomplete { expected: usize, received: usize },

    /// The stream accepted fewer bytes than the encoded telegram.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { expected: usize, written: usize },

    /// An I/O error occurred while reading or writing telegrams.
    #[error("telegram I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete telegram was received.
    #[error("connection closed (incomplete telegram)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, TelegramError>;
