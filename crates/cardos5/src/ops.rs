//! The driver operation contract
//!
//! [`CardOps`] is the full set of operations a card driver exposes to the
//! host stack. The generic ISO 7816 base implements it with baseline
//! behavior; the CardOS v5 driver overrides the card-specific operations and
//! delegates the rest.

use bytes::Bytes;
use cardos5_apdu_core::StatusWord;

use crate::error::Result;
use crate::file::FileDescriptor;

/// Security operation selected by MANAGE SECURITY ENVIRONMENT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecOperation {
    /// Compute a digital signature
    Sign,
    /// Decipher
    Decipher,
}

/// Algorithm family of the key referenced by a security environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RSA
    Rsa,
    /// Elliptic curve
    Ec,
}

/// A security environment to install on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityEnv {
    /// The operation the environment is set for
    pub operation: SecOperation,
    /// Algorithm family of the referenced key
    pub algorithm: Algorithm,
    /// Key reference on the card
    pub key_ref: u8,
}

/// PIN operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOperation {
    /// VERIFY
    Verify,
    /// CHANGE REFERENCE DATA
    Change,
    /// RESET RETRY COUNTER (unblock)
    Unblock,
}

/// A PIN command
///
/// `reference` is rewritten by the CardOS v5 driver to carry the backtrack
/// bit before transmission; `tries_left` is filled in when the card reports
/// a remaining-attempts counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinCommand {
    /// What to do
    pub operation: PinOperation,
    /// PIN reference
    pub reference: u8,
    /// The PIN (for Verify/Change) or unblocking code (for Unblock)
    pub pin: Vec<u8>,
    /// The new PIN, for Change and Unblock
    pub new_pin: Option<Vec<u8>>,
    /// Remaining attempts reported by the card, when available
    pub tries_left: Option<u8>,
}

impl PinCommand {
    /// Create a VERIFY command
    pub const fn verify(reference: u8, pin: Vec<u8>) -> Self {
        Self {
            operation: PinOperation::Verify,
            reference,
            pin,
            new_pin: None,
            tries_left: None,
        }
    }
}

/// Card life cycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Administration (personalization) phase
    Admin,
    /// Operational phase
    User,
    /// Manufacturing or death phase
    Other,
}

/// Card-specific control operations
///
/// The set is closed: anything a CardOS v5 card cannot do has no variant
/// here.
#[derive(Debug)]
pub enum CardCtl<'a> {
    /// Stream a data object to the card, receiving a running hash back
    AccumulateObjectData {
        /// Append to an existing object instead of allocating a new one
        append: bool,
        /// The object data chunk
        data: &'a [u8],
        /// Size of the hash the card returns after its two status bytes
        hash_len: usize,
    },
    /// Generate an on-board key pair
    GenerateKey {
        /// Key generation parameters
        data: &'a [u8],
    },
    /// Extract the public part of an on-board key
    ExtractKey {
        /// Key extraction parameters
        data: &'a [u8],
    },
    /// PUT DATA with elliptic curve domain parameters
    PutDataEcd {
        /// The encoded domain parameters
        data: &'a [u8],
    },
    /// Persist the card's data field length (takes effect after the next
    /// reset)
    InitCard,
    /// PUT DATA with object control information
    PutDataOci {
        /// The encoded object control information
        data: &'a [u8],
    },
    /// PUT DATA with security environment control information
    PutDataSeci {
        /// The encoded security environment control information
        data: &'a [u8],
    },
    /// Read the current life cycle phase
    LifecycleGet,
    /// Move the card to a life cycle phase
    LifecycleSet {
        /// The target phase
        target: Lifecycle,
    },
}

/// Replies to [`CardCtl`] requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardCtlReply {
    /// The operation completed without response data
    Done,
    /// The running hash returned by ACCUMULATE OBJECT DATA
    Hash(Vec<u8>),
    /// The extracted key material
    Key(Bytes),
    /// The current life cycle phase
    Lifecycle(Lifecycle),
}

/// The full driver operation contract
pub trait CardOps {
    /// Select a file by path; returns a descriptor when `want_fci` is set
    fn select_file(&mut self, path: &[u8], want_fci: bool) -> Result<Option<FileDescriptor>>;

    /// Create a file from a host descriptor
    fn create_file(&mut self, file: &FileDescriptor) -> Result<()>;

    /// Populate a descriptor from FCP bytes returned by the card
    fn process_fci(&self, file: &mut FileDescriptor, fcp: &[u8]) -> Result<()>;

    /// Read from a transparent EF
    fn read_binary(&mut self, offset: u16, len: usize) -> Result<Bytes>;

    /// Write to a transparent EF
    fn write_binary(&mut self, offset: u16, data: &[u8]) -> Result<()>;

    /// Update a transparent EF
    fn update_binary(&mut self, offset: u16, data: &[u8]) -> Result<()>;

    /// Install a security environment
    fn set_security_env(&mut self, env: &SecurityEnv) -> Result<()>;

    /// Restore a stored security environment
    fn restore_security_env(&mut self, se_num: u8) -> Result<()>;

    /// Sign `data`, writing the (possibly re-encoded) signature into `out`
    /// and returning its length
    fn compute_signature(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize>;

    /// Verify, change or unblock a PIN
    fn pin_cmd(&mut self, cmd: &mut PinCommand) -> Result<()>;

    /// Card-specific control operations
    fn card_ctl(&mut self, ctl: CardCtl<'_>) -> Result<CardCtlReply>;

    /// Enumerate the children of the selected DF
    fn list_files(&mut self) -> Result<Vec<u16>>;

    /// Read a data object
    fn get_data(&mut self, tag: u16, out: &mut [u8]) -> Result<usize>;

    /// Map a status word to success or a driver error
    fn check_sw(&self, status: StatusWord) -> Result<()>;

    /// Drop the card's authentication state
    fn logout(&mut self) -> Result<()>;
}
