//! File control parameter codec
//!
//! Builds the FCP templates sent with CREATE FILE and provides the raw
//! top-level tag scan used to pull the security attribute out of an FCP
//! returned by SELECT FILE. The security attribute content is treated as
//! opaque here; decoding it is the ARL codec's job.

use tracing::debug;

use crate::arl::{build_df_arl, build_ef_arl};
use crate::consts::tags;
use crate::error::{Error, Result};
use crate::file::{EfStructure, FileDescriptor, FileKind};
use crate::tlv::TlvBuf;

/// Working buffer size for an FCP body
const FCP_BODY_CAP: usize = 128;
/// Working buffer size for a DF access rule list
const DF_ARL_CAP: usize = 128;
/// Working buffer size for an EF access rule list
const EF_ARL_CAP: usize = 96;
/// Largest CREATE FILE data field (short APDU)
pub(crate) const CREATE_DATA_CAP: usize = 255;

fn file_size_bytes(file: &FileDescriptor) -> Result<[u8; 2]> {
    if file.size > u16::MAX as usize {
        debug!(size = file.size, "file size too large");
        return Err(Error::InvalidArguments("file size exceeds 16 bits"));
    }
    Ok((file.size as u16).to_be_bytes())
}

fn construct_df_fcp(df: &FileDescriptor, fcp: &mut TlvBuf<'_>) -> Result<()> {
    fcp.put_tag1(tags::DESCRIPTOR, tags::TYPE_DF)?;
    fcp.put_tag(tags::SIZE, &file_size_bytes(df)?)?;

    if let Some(name) = df.name.as_deref() {
        if !name.is_empty() {
            fcp.put_tag(tags::DF_NAME, name)?;
        }
    }

    let mut arl_buf = [0u8; DF_ARL_CAP];
    let mut arl = TlvBuf::new(&mut arl_buf);
    build_df_arl(df, &mut arl)?;
    fcp.put_tag(tags::SEC_ATTR, arl.as_slice())
}

fn construct_ef_fcp(ef: &FileDescriptor, fcp: &mut TlvBuf<'_>) -> Result<()> {
    if ef.ef_structure != EfStructure::Transparent {
        debug!(structure = ?ef.ef_structure, "unsupported ef structure");
        return Err(Error::NotSupported);
    }

    fcp.put_tag1(tags::DESCRIPTOR, tags::TYPE_BINARY_EF)?;
    fcp.put_tag(tags::SIZE, &file_size_bytes(ef)?)?;
    fcp.put_tag0(tags::SFID)?;

    let mut arl_buf = [0u8; EF_ARL_CAP];
    let mut arl = TlvBuf::new(&mut arl_buf);
    build_ef_arl(ef, &mut arl)?;
    fcp.put_tag(tags::SEC_ATTR, arl.as_slice())
}

/// Build the complete FCP template for CREATE FILE
pub(crate) fn construct_fcp(file: &FileDescriptor, out: &mut TlvBuf<'_>) -> Result<()> {
    let mut body_buf = [0u8; FCP_BODY_CAP];
    let mut body = TlvBuf::new(&mut body_buf);

    match file.kind {
        FileKind::Df => construct_df_fcp(file, &mut body)?,
        FileKind::WorkingEf => construct_ef_fcp(file, &mut body)?,
    }

    body.put_tag(tags::FILE_ID, &file.id.to_be_bytes())?;
    out.put_tag(tags::FCP_TEMPLATE, body.as_slice())
}

/// Read one TLV at the start of `buf`, tolerating the 1/2/3-byte length
/// forms the card emits
///
/// Returns the tag, its content and the remainder, or `None` when the bytes
/// do not form a TLV.
pub(crate) fn read_tlv(buf: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    if buf.len() < 2 {
        return None;
    }
    let tag = buf[0];
    let (len, header) = match buf[1] {
        l @ 0x00..=0x7F => (l as usize, 2),
        0x81 if buf.len() >= 3 => (buf[2] as usize, 3),
        0x82 if buf.len() >= 4 => (((buf[2] as usize) << 8) | buf[3] as usize, 4),
        _ => return None,
    };
    if buf.len() < header + len {
        return None;
    }
    Some((tag, &buf[header..header + len], &buf[header + len..]))
}

/// Locate a top-level tag in an FCP body and return its content
pub(crate) fn find_tag(mut buf: &[u8], wanted: u8) -> Option<&[u8]> {
    while let Some((tag, content, rest)) = read_tlv(buf) {
        if tag == wanted {
            return Some(content);
        }
        buf = rest;
    }
    None
}
