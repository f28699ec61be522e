//! Opcodes and ack reason codes.

use std::fmt;

/// Telegram opcode, the second header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    /// Write a value to a controller object.
    Set = 0,
    /// Request the value of a controller object.
    Get = 1,
    /// Reply to a Get or Set.
    Ack = 3,
    /// Unsolicited event from the controller.
    Tell = 4,
}

impl Opcode {
    /// Wire value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode a wire value.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Set),
            1 => Some(Self::Get),
            3 => Some(Self::Ack),
            4 => Some(Self::Tell),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Get => "GET",
            Self::Ack => "ACK",
            Self::Tell => "TELL",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome reported in the `reason` field of an Ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Ok,
    InvalidAddress,
    Range,
    Ignored,
    VerifyFailed,
    WrongType,
    Unknown,
    /// A code the protocol does not define.
    Other(i32),
}

impl Reason {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::InvalidAddress,
            2 => Self::Range,
            3 => Self::Ignored,
            4 => Self::VerifyFailed,
            5 => Self::WrongType,
            99 => Self::Unknown,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::InvalidAddress => 1,
            Self::Range => 2,
            Self::Ignored => 3,
            Self::VerifyFailed => 4,
            Self::WrongType => 5,
            Self::Unknown => 99,
            Self::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::InvalidAddress => f.write_str("invalid address"),
            Self::Range => f.write_str("value out of range"),
            Self::Ignored => f.write_str("telegram ignored"),
            Self::VerifyFailed => f.write_str("verify of data failed"),
            Self::WrongType => f.write_str("wrong type of data"),
            Self::Unknown => f.write_str("unknown error"),
            Self::Other(code) => write!(f, "undefined reason {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_codes_match_wire_values() {
        for opcode in [Opcode::Set, Opcode::Get, Opcode::Ack, Opcode::Tell] {
            assert_eq!(Opcode::from_code(opcode.code()), Some(opcode));
        }
        assert_eq!(Opcode::Ack.code(), 3);
        assert_eq!(Opcode::from_code(2), None);
    }

    #[test]
    fn reason_preserves_undefined_codes() {
        assert_eq!(Reason::from_code(99), Reason::Unknown);
        assert_eq!(Reason::from_code(42), Reason::Other(42));
        assert_eq!(Reason::Other(42).code(), 42);
        assert!(Reason::from_code(0).is_ok());
        assert_eq!(Reason::Range.to_string(), "value out of range");
    }
}
