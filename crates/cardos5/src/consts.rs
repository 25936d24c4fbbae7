//! Card-defined constants: template tags, access rule encodings, access mode
//! bytes and APDU headers
//!
//! Everything in here is fixed by the CardOS v5 firmware interface; none of
//! it is negotiable at runtime.

/// Bit 0x80 of a PIN reference: search parent DFs for the named PIN.
///
/// Set on the wire for VERIFY, never stored in ACLs and never accepted from
/// callers that already set it.
pub const BACKTRACK_PIN: u8 = 0x80;

/// Mask clearing the backtrack bit from a PIN reference
pub const BACKTRACK_MASK: u8 = 0x7F;

/// FCP/FCI template tags
pub mod tags {
    /// FCP template, wraps the CREATE FILE data field
    pub const FCP_TEMPLATE: u8 = 0x62;
    /// FCI envelope returned by SELECT FILE
    pub const FCI_TEMPLATE: u8 = 0x6F;
    /// File descriptor byte
    pub const DESCRIPTOR: u8 = 0x82;
    /// File size, big-endian 16 bit
    pub const SIZE: u8 = 0x81;
    /// File identifier, big-endian 16 bit
    pub const FILE_ID: u8 = 0x83;
    /// DF name
    pub const DF_NAME: u8 = 0x84;
    /// Short file identifier
    pub const SFID: u8 = 0x88;
    /// Life cycle status byte
    pub const LIFE_CYCLE: u8 = 0x8A;
    /// Security attribute (the ARL)
    pub const SEC_ATTR: u8 = 0xAB;

    /// Descriptor byte for a DF
    pub const TYPE_DF: u8 = 0x38;
    /// Descriptor byte for a transparent working EF
    pub const TYPE_BINARY_EF: u8 = 0x01;
}

/// Access rule list wire encoding
pub mod arl {
    /// Access mode byte scope
    pub const ACCESS_MODE_BYTE_TAG: u8 = 0x80;
    /// Length of an access mode byte scope
    pub const ACCESS_MODE_BYTE_LEN: u8 = 0x01;
    /// Command scope: a literal CLA INS P1 P2 header
    pub const COMMAND_TAG: u8 = 0x84;
    /// Length of a command scope
    pub const COMMAND_LEN: u8 = 0x04;
    /// Operation always allowed
    pub const ALWAYS_TAG: u8 = 0x90;
    /// Length of an always predicate
    pub const ALWAYS_LEN: u8 = 0x00;
    /// Operation never allowed
    pub const NEVER_TAG: u8 = 0x97;
    /// Length of a never predicate
    pub const NEVER_LEN: u8 = 0x00;
    /// Operation allowed after user authentication; content is a CRT
    pub const USER_AUTH_TAG: u8 = 0xA4;
    /// Length of a user-auth predicate
    pub const USER_AUTH_LEN: u8 = 0x06;
    /// Filler tag in the master file's compact "allow everything" rule
    pub const DUMMY_TAG: u8 = 0x81;
    /// Length of the filler tag
    pub const DUMMY_LEN: u8 = 0x00;
}

/// Control reference template tags and key usage qualifiers
pub mod crt {
    /// PIN reference within a user-auth predicate
    pub const TAG_PINREF: u8 = 0x83;
    /// Length of a PIN reference
    pub const LEN_PINREF: u8 = 0x01;
    /// Key reference within a MANAGE SECURITY ENVIRONMENT body
    pub const TAG_KEYREF: u8 = 0x84;
    /// Key usage qualifier
    pub const TAG_KUQ: u8 = 0x95;
    /// Length of a key usage qualifier
    pub const LEN_KUQ: u8 = 0x01;

    /// KUQ value: user authentication
    pub const KUQ_USER_AUTH: u8 = 0x08;
    /// KUQ value: decipherment/computation
    pub const KUQ_DECRYPT: u8 = 0x40;
}

/// Access mode bytes, per file kind
pub mod am {
    /// EF: delete file
    pub const EF_DELETE: u8 = 0x40;
    /// EF: terminate file
    pub const EF_TERMINATE: u8 = 0x20;
    /// EF: activate
    pub const EF_ACTIVATE: u8 = 0x10;
    /// EF: deactivate
    pub const EF_DEACTIVATE: u8 = 0x08;
    /// EF: write binary
    pub const EF_WRITE: u8 = 0x04;
    /// EF: update binary
    pub const EF_UPDATE: u8 = 0x02;
    /// EF: read binary
    pub const EF_READ: u8 = 0x01;
    /// EF: increase (record counters)
    pub const EF_INCREASE: u8 = 0x81;
    /// EF: decrease (record counters)
    pub const EF_DECREASE: u8 = 0x82;

    /// DF: delete self
    pub const DF_DELETE_SELF: u8 = 0x40;
    /// DF: terminate DF
    pub const DF_TERMINATE: u8 = 0x20;
    /// DF: activate
    pub const DF_ACTIVATE: u8 = 0x10;
    /// DF: deactivate
    pub const DF_DEACTIVATE: u8 = 0x08;
    /// DF: create child DF
    pub const DF_CREATE_DF_FILE: u8 = 0x04;
    /// DF: create child EF
    pub const DF_CREATE_EF_FILE: u8 = 0x02;
    /// DF: delete child file
    pub const DF_DELETE_CHILD: u8 = 0x01;
    /// DF: PUT DATA with object control information
    pub const DF_PUT_DATA_OCI: u8 = 0x81;
    /// DF: PUT DATA updating object control information
    pub const DF_PUT_DATA_OCI_UPDATE: u8 = 0x82;
    /// DF: load executable
    pub const DF_LOAD_EXECUTABLE: u8 = 0x84;
    /// DF: PUT DATA with file control information
    pub const DF_PUT_DATA_FCI: u8 = 0x88;
}

/// APDU instruction bytes and parameters
pub mod apdu {
    /// SELECT FILE
    pub const SELECT_INS: u8 = 0xA4;
    /// SELECT by 2-byte file identifier
    pub const SELECT_P1_FILE_ID: u8 = 0x00;
    /// SELECT by path from the MF
    pub const SELECT_P1_FULL_PATH: u8 = 0x08;
    /// SELECT returning FCI
    pub const SELECT_P2_FCI: u8 = 0x00;
    /// SELECT without response data
    pub const SELECT_P2_NO_RESPONSE: u8 = 0x0C;

    /// CREATE FILE
    pub const CREATE_FILE_INS: u8 = 0xE0;

    /// MANAGE SECURITY ENVIRONMENT
    pub const MSE_INS: u8 = 0x22;
    /// MSE: set for computation
    pub const MSE_P1_SET: u8 = 0x41;
    /// MSE: digital signature template
    pub const MSE_P2_SIGN: u8 = 0xB6;
    /// MSE: confidentiality template
    pub const MSE_P2_DECIPHER: u8 = 0xB8;

    /// PERFORM SECURITY OPERATION
    pub const PSO_INS: u8 = 0x2A;
    /// PSO: compute digital signature (P1)
    pub const PSO_P1_SIGN: u8 = 0x9E;
    /// PSO: data to be signed (P2)
    pub const PSO_P2_SIGN: u8 = 0x9A;

    /// PUT DATA
    pub const PUT_DATA_INS: u8 = 0xDA;
    /// PUT DATA: elliptic curve domain parameters (P1)
    pub const PUT_DATA_ECD_P1: u8 = 0x01;
    /// PUT DATA: elliptic curve domain parameters (P2)
    pub const PUT_DATA_ECD_P2: u8 = 0x6C;
    /// PUT DATA: object control information (P1)
    pub const PUT_DATA_OCI_P1: u8 = 0x01;
    /// PUT DATA: object control information (P2)
    pub const PUT_DATA_OCI_P2: u8 = 0x6E;
    /// PUT DATA: security environment control information (P1)
    pub const PUT_DATA_SECI_P1: u8 = 0x01;
    /// PUT DATA: security environment control information (P2)
    pub const PUT_DATA_SECI_P2: u8 = 0x6D;

    /// GET DATA
    pub const GET_DATA_INS: u8 = 0xCA;
    /// GET DATA: life cycle phase (P1)
    pub const LIFE_CYCLE_P1: u8 = 0x01;
    /// GET DATA: life cycle phase (P2)
    pub const LIFE_CYCLE_P2: u8 = 0x83;

    /// VERIFY
    pub const VERIFY_INS: u8 = 0x20;
    /// CHANGE REFERENCE DATA
    pub const CHANGE_REFERENCE_DATA_INS: u8 = 0x24;
    /// RESET RETRY COUNTER
    pub const RESET_RETRY_COUNTER_INS: u8 = 0x2C;

    /// READ BINARY
    pub const READ_BINARY_INS: u8 = 0xB0;
    /// WRITE BINARY
    pub const WRITE_BINARY_INS: u8 = 0xD0;
    /// UPDATE BINARY
    pub const UPDATE_BINARY_INS: u8 = 0xD6;

    /// GENERATE/EXTRACT KEY
    pub const GENERATE_KEY_INS: u8 = 0x46;
    /// Generate an on-board key pair (P1)
    pub const GENERATE_KEY_P1_GENERATE: u8 = 0x80;
    /// Extract the public part of a generated key (P1)
    pub const GENERATE_KEY_P1_EXTRACT: u8 = 0x86;

    /// ACCUMULATE OBJECT DATA (proprietary class)
    pub const ACCUMULATE_OBJECT_DATA_CLA: u8 = 0x80;
    /// ACCUMULATE OBJECT DATA instruction
    pub const ACCUMULATE_OBJECT_DATA_INS: u8 = 0xD2;
    /// ACCUMULATE OBJECT DATA: allocate a new object (P1)
    pub const ACCUMULATE_OBJECT_DATA_P1_NEW: u8 = 0x01;
    /// ACCUMULATE OBJECT DATA: append to an existing object (P1)
    pub const ACCUMULATE_OBJECT_DATA_P1_APPEND: u8 = 0x00;

    /// PHASE CONTROL (proprietary class)
    pub const PHASE_CONTROL_CLA: u8 = 0x80;
    /// PHASE CONTROL instruction
    pub const PHASE_CONTROL_INS: u8 = 0x10;
    /// PHASE CONTROL: toggle life cycle phase (P1)
    pub const PHASE_CONTROL_P1_TOGGLE: u8 = 0x00;
    /// PHASE CONTROL: toggle life cycle phase (P2)
    pub const PHASE_CONTROL_P2_TOGGLE: u8 = 0x00;

    /// SET DATA FIELD LENGTH (proprietary class)
    pub const SET_DATA_FIELD_LENGTH_CLA: u8 = 0x80;
    /// SET DATA FIELD LENGTH instruction
    pub const SET_DATA_FIELD_LENGTH_INS: u8 = 0x9C;
    /// Persisted data field length, high byte (P1)
    pub const SET_DATA_FIELD_LENGTH_P1: u8 = 0x03;
    /// Persisted data field length, low byte (P2)
    pub const SET_DATA_FIELD_LENGTH_P2: u8 = 0x00;
}
