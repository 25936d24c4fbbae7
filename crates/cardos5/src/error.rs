//! Error type for CardOS v5 driver operations

use cardos5_apdu_core::{Error as ApduError, StatusWord};

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for driver operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Caller-side misuse: bad path, unsupported file kind, out-of-range
    /// values, signing without a security environment
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// A parameter the card would reject outright, caught before transmission
    #[error("incorrect parameters: {0}")]
    IncorrectParameters(&'static str),

    /// A TLV/FCP/ARL builder or the signature encoder ran out of buffer space
    #[error("buffer too small")]
    BufferTooSmall,

    /// A card data structure had a length inconsistent with its contents
    #[error("wrong length")]
    WrongLength,

    /// The card returned an access rule this driver cannot represent
    #[error("not supported by card")]
    NoCardSupport,

    /// The card returned data the driver cannot interpret
    #[error("unknown data received from card")]
    UnknownDataReceived,

    /// The card accepted a command but replied with nonsense
    #[error("card command failed: {0}")]
    CardCmdFailed(&'static str),

    /// The operation is not supported by this card or driver
    #[error("not supported")]
    NotSupported,

    /// The card answered with a non-success status word, surfaced unchanged
    #[error("card error {status}: {message}")]
    Card {
        /// Status word as returned by the card
        status: StatusWord,
        /// Human-readable interpretation of the status word
        message: &'static str,
    },

    /// APDU construction or transport failure
    #[error(transparent)]
    Apdu(#[from] ApduError),
}

impl Error {
    pub(crate) const fn card(status: StatusWord, message: &'static str) -> Self {
        Self::Card { status, message }
    }
}
