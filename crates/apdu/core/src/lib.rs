//! APDU types and transport traits for the CardOS v5 driver
//!
//! This crate provides the foundational pieces for talking ISO/IEC 7816-4 to
//! a smart card:
//!
//! - [`Command`] — an APDU command covering all four ISO cases, with both
//!   short and extended length encodings
//! - [`Response`] — a parsed response (payload + status word)
//! - [`StatusWord`] — SW1/SW2 with the usual ISO interpretations
//! - [`CardTransport`] — the seam to whatever actually moves bytes to a card
//!
//! The transport is always injected by the caller; nothing in this crate
//! holds global state.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod status;
pub mod transport;

pub use command::Command;
pub use error::Error;
pub use response::Response;
pub use status::StatusWord;
pub use transport::CardTransport;

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::command::Command;
    pub use crate::error::Error;
    pub use crate::response::Response;
    pub use crate::status::StatusWord;
    pub use crate::transport::CardTransport;
    pub use crate::{Bytes, BytesMut};
}
