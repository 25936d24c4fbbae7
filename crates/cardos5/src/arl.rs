//! Access rule list codec
//!
//! An ARL is a concatenation of entries, each a scope (an access mode byte,
//! a literal APDU header, or nothing) followed by a predicate (always, never,
//! or user authentication against a PIN reference). The card stores the ARL
//! inside the FCP security attribute; this module builds the ARLs sent with
//! CREATE FILE and decodes the ones read back after SELECT FILE.

use tracing::debug;

use crate::consts::{am, apdu, arl, crt, BACKTRACK_MASK, BACKTRACK_PIN};
use crate::error::{Error, Result};
use crate::file::{AclMethod, AclOp, FileDescriptor, FileKind};
use crate::tlv::TlvBuf;

/// One row of an access mode byte table: the card's AM byte and the abstract
/// operation it maps to, if any
#[derive(Debug, Clone, Copy)]
pub(crate) struct AmEntry {
    pub(crate) am_byte: u8,
    pub(crate) op: Option<AclOp>,
}

const fn entry(am_byte: u8, op: Option<AclOp>) -> AmEntry {
    AmEntry { am_byte, op }
}

/// Access mode bytes of a working EF, in the card's canonical order
pub(crate) const EF_AM_TABLE: [AmEntry; 9] = [
    entry(am::EF_DELETE, Some(AclOp::Delete)),
    entry(am::EF_TERMINATE, None),
    entry(am::EF_ACTIVATE, Some(AclOp::Rehabilitate)),
    entry(am::EF_DEACTIVATE, Some(AclOp::Invalidate)),
    entry(am::EF_WRITE, Some(AclOp::Write)),
    entry(am::EF_UPDATE, Some(AclOp::Update)),
    entry(am::EF_READ, Some(AclOp::Read)),
    entry(am::EF_INCREASE, None),
    entry(am::EF_DECREASE, None),
];

/// Access mode bytes of a DF, in the card's canonical order
pub(crate) const DF_AM_TABLE: [AmEntry; 11] = [
    entry(am::DF_DELETE_SELF, Some(AclOp::Delete)),
    entry(am::DF_TERMINATE, None),
    entry(am::DF_ACTIVATE, Some(AclOp::Rehabilitate)),
    entry(am::DF_DEACTIVATE, Some(AclOp::Invalidate)),
    entry(am::DF_CREATE_DF_FILE, Some(AclOp::Create)),
    entry(am::DF_CREATE_EF_FILE, Some(AclOp::Create)),
    entry(am::DF_DELETE_CHILD, None),
    entry(am::DF_PUT_DATA_OCI, Some(AclOp::Create)),
    entry(am::DF_PUT_DATA_OCI_UPDATE, Some(AclOp::Update)),
    entry(am::DF_LOAD_EXECUTABLE, None),
    entry(am::DF_PUT_DATA_FCI, Some(AclOp::Create)),
];

/// Append one ARL entry: an optional AM scope followed by the predicate for
/// `method`
///
/// `am_byte` of `None` omits the scope, used for command-scoped entries whose
/// scope the caller wrote already.
pub(crate) fn push_access_rule(
    am_byte: Option<u8>,
    method: AclMethod,
    buf: &mut TlvBuf<'_>,
) -> Result<()> {
    if let Some(am_byte) = am_byte {
        buf.put_tag1(arl::ACCESS_MODE_BYTE_TAG, am_byte)?;
    }

    match method {
        AclMethod::Always => buf.put_tag0(arl::ALWAYS_TAG),
        AclMethod::Never => buf.put_tag0(arl::NEVER_TAG),
        AclMethod::Chv { pin_ref }
        | AclMethod::Term { pin_ref }
        | AclMethod::Aut { pin_ref } => {
            if pin_ref & BACKTRACK_PIN != 0 {
                debug!(pin_ref, "refusing to encode pin reference with backtrack bit");
                return Err(Error::InvalidArguments(
                    "pin reference carries the backtrack bit",
                ));
            }

            let mut crt_buf = [0u8; 16];
            let mut crt_tlv = TlvBuf::new(&mut crt_buf);
            crt_tlv.put_tag1(crt::TAG_PINREF, pin_ref)?;
            crt_tlv.put_tag1(crt::TAG_KUQ, crt::KUQ_USER_AUTH)?;
            buf.put_tag(arl::USER_AUTH_TAG, crt_tlv.as_slice())
        }
    }
}

fn method_for(file: &FileDescriptor, entry: &AmEntry) -> AclMethod {
    entry
        .op
        .and_then(|op| file.acl_entry(op))
        .map_or(AclMethod::Never, |e| e.method)
}

/// Build the ARL of a DF for CREATE FILE
pub(crate) fn build_df_arl(df: &FileDescriptor, buf: &mut TlvBuf<'_>) -> Result<()> {
    // An Update ACL also governs PUT DATA with EC domain parameters, which
    // has no access mode byte of its own; grant it by command header.
    if let Some(e) = df.acl_entry(AclOp::Update) {
        let cmd = [
            0x00,
            apdu::PUT_DATA_INS,
            apdu::PUT_DATA_ECD_P1,
            apdu::PUT_DATA_ECD_P2,
        ];
        buf.put_tag(arl::COMMAND_TAG, &cmd)?;
        push_access_rule(None, e.method, buf)?;
    }

    for entry in &DF_AM_TABLE {
        push_access_rule(Some(entry.am_byte), method_for(df, entry), buf)?;
    }

    // Life cycle toggling through PHASE CONTROL stays possible without a PIN
    // once the DF exists.
    let cmd = [
        apdu::PHASE_CONTROL_CLA,
        apdu::PHASE_CONTROL_INS,
        apdu::PHASE_CONTROL_P1_TOGGLE,
        apdu::PHASE_CONTROL_P2_TOGGLE,
    ];
    buf.put_tag(arl::COMMAND_TAG, &cmd)?;
    buf.put_tag0(arl::ALWAYS_TAG)?;

    // Same for ACCUMULATE OBJECT DATA, for new and for existing objects.
    for p1 in [
        apdu::ACCUMULATE_OBJECT_DATA_P1_NEW,
        apdu::ACCUMULATE_OBJECT_DATA_P1_APPEND,
    ] {
        let cmd = [
            apdu::ACCUMULATE_OBJECT_DATA_CLA,
            apdu::ACCUMULATE_OBJECT_DATA_INS,
            p1,
            0x00,
        ];
        buf.put_tag(arl::COMMAND_TAG, &cmd)?;
        buf.put_tag0(arl::ALWAYS_TAG)?;
    }

    Ok(())
}

/// Build the ARL of a working EF for CREATE FILE
pub(crate) fn build_ef_arl(ef: &FileDescriptor, buf: &mut TlvBuf<'_>) -> Result<()> {
    for entry in &EF_AM_TABLE {
        push_access_rule(Some(entry.am_byte), method_for(ef, entry), buf)?;
    }
    Ok(())
}

/// The master file reports a compact "allow everything" rule instead of a
/// per-operation list. Two shapes occur: the firmware's 9-byte form, which is
/// recognizable by its dummy/always tail, and the wildcard access mode byte
/// 0xFF with or without that tail.
fn is_mf_wildcard(arl: &[u8]) -> bool {
    const TAIL: [u8; 4] = [
        arl::DUMMY_TAG,
        arl::DUMMY_LEN,
        arl::ALWAYS_TAG,
        arl::ALWAYS_LEN,
    ];
    const WILDCARD: [u8; 3] = [arl::ACCESS_MODE_BYTE_TAG, arl::ACCESS_MODE_BYTE_LEN, 0xFF];

    (arl.len() == 9 && arl[5..] == TAIL)
        || (arl.len() >= 3
            && arl[..3] == WILDCARD
            && (arl.len() == 3 || arl[3..] == TAIL))
}

/// Decode the security attribute of `file` into ACL entries
///
/// Entries whose access mode byte maps to no abstract operation are dropped;
/// user-auth predicates decode to [`AclMethod::Chv`] with the backtrack bit
/// stripped from the PIN reference. Leftover bytes fail with
/// [`Error::WrongLength`], anything unrepresentable with
/// [`Error::NoCardSupport`].
pub(crate) fn parse_arl(file: &mut FileDescriptor, arl: &[u8]) -> Result<()> {
    match file.kind {
        FileKind::Df => parse(file, arl, &DF_AM_TABLE, true),
        FileKind::WorkingEf => parse(file, arl, &EF_AM_TABLE, false),
    }
}

fn parse(
    file: &mut FileDescriptor,
    mut bytes: &[u8],
    table: &[AmEntry],
    is_df: bool,
) -> Result<()> {
    if is_df && is_mf_wildcard(bytes) {
        for entry in table {
            if let Some(op) = entry.op {
                file.add_acl_entry(op, AclMethod::Always);
            }
        }
        return Ok(());
    }

    while bytes.len() >= 5 {
        // Command-scoped entries occur on DFs (the ACCUMULATE OBJECT DATA
        // grants written at creation); they carry no abstract operation and
        // are skipped.
        if is_df && bytes[0] == arl::COMMAND_TAG {
            if bytes.len() < 8 {
                return Err(Error::WrongLength);
            }
            if bytes[6] == arl::USER_AUTH_TAG {
                let skip = bytes[7] as usize;
                if bytes.len() < skip + 8 {
                    return Err(Error::WrongLength);
                }
                bytes = &bytes[skip..];
            }
            bytes = &bytes[8..];
            continue;
        }

        if bytes[0] != arl::ACCESS_MODE_BYTE_TAG || bytes[1] != arl::ACCESS_MODE_BYTE_LEN {
            debug!(tag = bytes[0], "unexpected tag in access rule list");
            return Err(Error::NoCardSupport);
        }

        let entry = table
            .iter()
            .find(|e| e.am_byte == bytes[2])
            .ok_or(Error::NoCardSupport)?;

        let method = match bytes[3] {
            arl::ALWAYS_TAG => {
                if bytes[4] != arl::ALWAYS_LEN {
                    return Err(Error::NoCardSupport);
                }
                bytes = &bytes[5..];
                AclMethod::Always
            }
            arl::NEVER_TAG => {
                if bytes[4] != arl::NEVER_LEN {
                    return Err(Error::NoCardSupport);
                }
                bytes = &bytes[5..];
                AclMethod::Never
            }
            arl::USER_AUTH_TAG => {
                if bytes.len() < 11 {
                    return Err(Error::WrongLength);
                }
                if bytes[4] != arl::USER_AUTH_LEN
                    || bytes[5] != crt::TAG_PINREF
                    || bytes[6] != crt::LEN_PINREF
                {
                    return Err(Error::NoCardSupport);
                }
                if bytes[8] != crt::TAG_KUQ
                    || bytes[9] != crt::LEN_KUQ
                    || bytes[10] != crt::KUQ_USER_AUTH
                {
                    return Err(Error::NoCardSupport);
                }
                let pin_ref = bytes[7] & BACKTRACK_MASK;
                bytes = &bytes[11..];
                AclMethod::Chv { pin_ref }
            }
            _ => {
                debug!(tag = bytes[3], "unsupported predicate in access rule list");
                return Err(Error::NoCardSupport);
            }
        };

        if let Some(op) = entry.op {
            file.add_acl_entry(op, method);
        }
    }

    if !bytes.is_empty() {
        return Err(Error::WrongLength);
    }

    Ok(())
}
