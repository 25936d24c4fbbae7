//! EC signature post-processing
//!
//! PERFORM SECURITY OPERATION returns an EC signature as the raw
//! concatenation of the R and S coordinates; v5.0 firmware additionally
//! appends a two-byte trailer to each coordinate. The host expects a DER
//! `SEQUENCE { INTEGER r, INTEGER s }`, so the coordinates are re-encoded
//! with the usual non-negativity padding and wrapped using the BER-TLV
//! writer.

use tracing::debug;

use crate::atr::CardType;
use crate::error::{Error, Result};
use crate::tlv::TlvBuf;

/// Trailer bytes after each coordinate on v5.0 firmware
const V5_0_COORDINATE_PAD: usize = 2;

fn encode_integer(coordinate: &[u8]) -> Result<Vec<u8>> {
    // The coordinate must fit a short-form ASN.1 length even after padding.
    if coordinate.len() >= 127 {
        return Err(Error::BufferTooSmall);
    }

    let pad = coordinate.first().is_some_and(|b| b & 0x80 != 0);
    let mut der = Vec::with_capacity(coordinate.len() + 3);
    der.push(0x02);
    if pad {
        der.push(coordinate.len() as u8 + 1);
        der.push(0x00);
    } else {
        der.push(coordinate.len() as u8);
    }
    der.extend_from_slice(coordinate);
    Ok(der)
}

/// Re-encode a raw EC signature response as DER, writing over `out`
///
/// Returns the number of bytes written. `out` is zeroed before the encoded
/// signature is placed at its start.
pub(crate) fn encode_ec_signature(
    card_type: CardType,
    raw: &[u8],
    out: &mut [u8],
) -> Result<usize> {
    let siglen = raw.len();
    if siglen < 4 || siglen > out.len() || siglen % 2 != 0 {
        debug!(siglen, outlen = out.len(), "invalid raw signature length");
        return Err(Error::InvalidArguments("invalid raw signature length"));
    }

    let (coordinate_len, stride) = match card_type {
        CardType::V5_0 => {
            let len = (siglen - 2 * V5_0_COORDINATE_PAD) / 2;
            (len, len + V5_0_COORDINATE_PAD)
        }
        CardType::V5_3 => (siglen / 2, siglen / 2),
    };

    let r = encode_integer(&raw[..coordinate_len])?;
    let s = encode_integer(&raw[stride..stride + coordinate_len])?;

    let mut point = Vec::with_capacity(r.len() + s.len());
    point.extend_from_slice(&r);
    point.extend_from_slice(&s);

    out.fill(0);
    let mut encoded = TlvBuf::new(out);
    encoded.bertlv_put_tag(0x30, &point)?;
    Ok(encoded.len())
}
