//! APDU command definitions
//!
//! [`Command`] models an ISO/IEC 7816-4 command APDU. Which of the four ISO
//! cases is used on the wire follows from the presence of command data and an
//! expected length; short versus extended encoding is chosen by the builder.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;

/// Largest expected length expressible with a short Le field (Le byte 0x00)
pub const MAX_LE_SHORT: u32 = 256;
/// Largest expected length expressible with an extended Le field (00 00)
pub const MAX_LE_EXTENDED: u32 = 65536;

/// An APDU command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    data: Option<Bytes>,
    le: Option<u32>,
    extended: bool,
}

impl Command {
    /// Create a case-1 command carrying only the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
            extended: false,
        }
    }

    /// Attach command data (case 3, or case 4 once an Le is set)
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected response length (case 2, or case 4 with data)
    pub const fn with_le(mut self, le: u32) -> Self {
        self.le = Some(le);
        self
    }

    /// Use extended Lc/Le fields when encoding
    pub const fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// Command data, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Expected response length, if any
    pub const fn le(&self) -> Option<u32> {
        self.le
    }

    /// Whether this command encodes with extended length fields
    pub const fn is_extended(&self) -> bool {
        self.extended
    }

    /// Serialize to wire bytes
    ///
    /// Fails if the data or expected length does not fit the selected
    /// (short or extended) encoding.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let data_len = self.data.as_ref().map_or(0, |d| d.len());
        let max_data = if self.extended { 65535 } else { 255 };
        if data_len > max_data {
            return Err(Error::InvalidCommandLength(data_len));
        }
        if let Some(le) = self.le {
            let max_le = if self.extended {
                MAX_LE_EXTENDED
            } else {
                MAX_LE_SHORT
            };
            if le == 0 || le > max_le {
                return Err(Error::InvalidExpectedLength(le));
            }
        }

        let mut buf = BytesMut::with_capacity(4 + 3 + data_len + 3);
        buf.put_u8(self.cla);
        buf.put_u8(self.ins);
        buf.put_u8(self.p1);
        buf.put_u8(self.p2);

        if let Some(data) = &self.data {
            if self.extended {
                buf.put_u8(0x00);
                buf.put_u16(data.len() as u16);
            } else {
                buf.put_u8(data.len() as u8);
            }
            buf.put_slice(data);
        }

        if let Some(le) = self.le {
            if self.extended {
                // A leading zero marks the extended form only when no Lc
                // field introduced it already.
                if self.data.is_none() {
                    buf.put_u8(0x00);
                }
                buf.put_u16((le % MAX_LE_EXTENDED) as u16);
            } else {
                buf.put_u8((le % MAX_LE_SHORT) as u8);
            }
        }

        Ok(buf.freeze())
    }
}
