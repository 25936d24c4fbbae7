//! Core error type for APDU construction and transport

use crate::status::StatusWord;

/// Errors raised while building, sending or parsing APDUs
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Failed to connect to the device
    #[error("connection error: failed to connect to device")]
    Connection,

    /// Failed to transmit data
    #[error("transmission error: failed to transmit data")]
    Transmission,

    /// Response shorter than a status word
    #[error("incomplete response")]
    IncompleteResponse,

    /// Command payload does not fit the selected encoding
    #[error("invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Expected-length field out of range for the selected encoding
    #[error("invalid expected length: {0}")]
    InvalidExpectedLength(u32),

    /// Card answered with a non-success status word
    #[error("status error {}: {}", .status, .status.description())]
    Status {
        /// The offending status word
        status: StatusWord,
    },
}

impl Error {
    /// Create a status error from SW1/SW2
    pub const fn status(sw1: u8, sw2: u8) -> Self {
        Self::Status {
            status: StatusWord::new(sw1, sw2),
        }
    }
}
