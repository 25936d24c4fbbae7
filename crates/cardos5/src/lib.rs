//! Driver for Atos CardOS v5.0 and v5.3 smart cards
//!
//! CardOS v5 speaks ISO/IEC 7816-4 with card-specific encodings for file
//! control parameters, access rule lists, key references and signature
//! output. This crate translates between a host stack's abstract file/ACL
//! model and those encodings:
//!
//! - building the FCP templates (with embedded access rule lists) sent by
//!   CREATE FILE, and decoding the ones returned by SELECT FILE
//! - installing security environments and re-encoding raw EC signatures as
//!   DER `SEQUENCE { INTEGER r, INTEGER s }`
//! - the proprietary control surface: object accumulation, on-board key
//!   generation and extraction, EC domain parameter upload, life cycle
//!   control
//!
//! The driver is composed, not inherited: [`Iso7816`] provides the generic
//! baseline over an injected [`CardTransport`](cardos5_apdu_core::CardTransport),
//! and [`Cardos5`] overrides exactly the operations the v5 firmware encodes
//! differently, borrowing the shared pieces of the v4 generation where the
//! two agree.

mod arl;
mod atr;
mod cardos4;
pub mod consts;
mod driver;
mod error;
mod fcp;
mod file;
mod iso7816;
mod ops;
mod sig;
mod tlv;

pub use atr::CardType;
pub use driver::{AlgorithmFlags, AlgorithmInfo, CardCaps, Cardos5, CARD_NAME};
pub use error::{Error, Result};
pub use file::{AclEntry, AclMethod, AclOp, EfStructure, FileDescriptor, FileKind};
pub use iso7816::Iso7816;
pub use ops::{
    Algorithm, CardCtl, CardCtlReply, CardOps, Lifecycle, PinCommand, PinOperation, SecOperation,
    SecurityEnv,
};
