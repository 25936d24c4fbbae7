//! Host-side file model
//!
//! The host stack owns file descriptors; this driver decorates them with the
//! card's security attributes and the ACL entries decoded from them.

use bytes::Bytes;

/// File kind, as far as this driver supports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Dedicated file (directory)
    Df,
    /// Working elementary file
    WorkingEf,
}

/// Structure of an elementary file
///
/// CardOS v5 working EFs are created transparent; the other structures exist
/// in the host model but are rejected by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EfStructure {
    /// Transparent (binary) structure
    #[default]
    Transparent,
    /// Linear fixed-length records
    LinearFixed,
    /// Linear variable-length records
    LinearVariable,
    /// Cyclic records
    Cyclic,
}

/// Abstract operations an ACL entry can govern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclOp {
    /// Delete the file
    Delete,
    /// Reactivate an invalidated file
    Rehabilitate,
    /// Invalidate (deactivate) the file
    Invalidate,
    /// Write
    Write,
    /// Update
    Update,
    /// Read
    Read,
    /// Create children (DF only)
    Create,
}

/// How an operation is allowed
///
/// The card treats `Chv`, `Term` and `Aut` uniformly as "user authentication
/// by PIN reference"; the distinction only matters to the host. PIN
/// references are stored without the backtrack bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclMethod {
    /// Always allowed
    Always,
    /// Never allowed
    Never,
    /// Allowed after card holder verification
    Chv {
        /// PIN reference, backtrack bit clear
        pin_ref: u8,
    },
    /// Allowed after terminal authentication
    Term {
        /// PIN reference, backtrack bit clear
        pin_ref: u8,
    },
    /// Allowed after external authentication
    Aut {
        /// PIN reference, backtrack bit clear
        pin_ref: u8,
    },
}

impl AclMethod {
    /// The PIN reference carried by user-authentication methods
    pub const fn pin_ref(&self) -> Option<u8> {
        match self {
            Self::Always | Self::Never => None,
            Self::Chv { pin_ref } | Self::Term { pin_ref } | Self::Aut { pin_ref } => {
                Some(*pin_ref)
            }
        }
    }
}

/// One ACL entry: an operation and the method guarding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    /// The governed operation
    pub op: AclOp,
    /// The guarding method
    pub method: AclMethod,
}

/// A file descriptor: identity, geometry, ACLs and the opaque security
/// attribute blob read back from the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// 2-byte file identifier
    pub id: u16,
    /// DF or working EF
    pub kind: FileKind,
    /// Declared size in bytes; must fit in 16 bits when encoded
    pub size: usize,
    /// DF name, supplied verbatim in the FCP when non-empty
    pub name: Option<Vec<u8>>,
    /// EF structure; only [`EfStructure::Transparent`] is accepted
    pub ef_structure: EfStructure,
    /// Life cycle status byte from the FCP, when present
    pub life_cycle: Option<u8>,
    acl: Vec<AclEntry>,
    sec_attr: Option<Bytes>,
}

impl FileDescriptor {
    /// Create a descriptor
    pub const fn new(id: u16, kind: FileKind, size: usize) -> Self {
        Self {
            id,
            kind,
            size,
            name: None,
            ef_structure: EfStructure::Transparent,
            life_cycle: None,
            acl: Vec::new(),
            sec_attr: None,
        }
    }

    /// Create a DF descriptor
    pub const fn new_df(id: u16, size: usize) -> Self {
        Self::new(id, FileKind::Df, size)
    }

    /// Create a transparent working EF descriptor
    pub const fn new_ef(id: u16, size: usize) -> Self {
        Self::new(id, FileKind::WorkingEf, size)
    }

    /// Set the DF name
    pub fn with_name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append an ACL entry
    ///
    /// Entries are kept in insertion order; an operation may appear several
    /// times (the card's DF table maps several access mode bytes to the same
    /// abstract operation).
    pub fn add_acl_entry(&mut self, op: AclOp, method: AclMethod) {
        self.acl.push(AclEntry { op, method });
    }

    /// Builder-style [`add_acl_entry`](Self::add_acl_entry)
    pub fn with_acl_entry(mut self, op: AclOp, method: AclMethod) -> Self {
        self.add_acl_entry(op, method);
        self
    }

    /// First ACL entry for an operation, if any
    pub fn acl_entry(&self, op: AclOp) -> Option<&AclEntry> {
        self.acl.iter().find(|e| e.op == op)
    }

    /// All ACL entries, in insertion order
    pub fn acl(&self) -> &[AclEntry] {
        &self.acl
    }

    /// The opaque security attribute read back from the card
    pub const fn sec_attr(&self) -> Option<&Bytes> {
        self.sec_attr.as_ref()
    }

    /// Attach the security attribute blob
    pub fn set_sec_attr(&mut self, attr: &[u8]) {
        self.sec_attr = Some(Bytes::copy_from_slice(attr));
    }
}
