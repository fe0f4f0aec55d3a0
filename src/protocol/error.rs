//! Protocol error types.

use thiserror::Error;

/// Errors related to payload encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message too short: expected at least {expected}, got {got}")]
    MessageTooShort { expected: usize, got: usize },

    #[error("field 0x{field:02x} too long: max {max}, got {got}")]
    FieldTooLong { field: u8, max: usize, got: usize },

    #[error("invalid length for field 0x{field:02x}: expected {expected}, got {got}")]
    InvalidFieldLength {
        field: u8,
        expected: usize,
        got: usize,
    },

    #[error("missing required field 0x{0:02x}")]
    MissingField(u8),

    #[error("too many neighbors: max {max}, got {got}")]
    TooManyNeighbors { max: usize, got: usize },

    #[error("invalid utf-8 in field 0x{0:02x}")]
    InvalidUtf8(u8),

    #[error("unknown encrypted payload type: 0x{0:02x}")]
    UnknownPayloadType(u8),

    #[error("empty payload")]
    Empty,
}
