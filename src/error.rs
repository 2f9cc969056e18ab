//! Reasons a command in the stream fails.

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("opcode {0:#04x} has no handler")]
    UnassignedOpcode(u8),

    #[error("scan opcode {0:#04x} asks for more than 32 bits, which is not supported")]
    UnsupportedScanWidth(u8),

    #[error("{0} is not a TAP state id")]
    InvalidState(u32),

    #[error("opcode length {0} is outside 1..=32")]
    InvalidOpcodeLength(u32),

    #[error("request ended at word {position} while reading command arguments")]
    TruncatedRequest { position: usize },

    /// The response buffer is smaller than what the request produces.
    #[error("response buffer full at word {position}")]
    ResponseOverflow { position: usize },
}
