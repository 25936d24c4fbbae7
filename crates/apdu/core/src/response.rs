//! APDU response parsing

use bytes::Bytes;
use tracing::trace;

use crate::error::Error;
use crate::status::StatusWord;

/// A parsed APDU response: optional payload plus the trailing status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Option<Bytes>,
    status: StatusWord,
}

impl Response {
    /// Create a response from payload and status
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload,
            status: status.into(),
        }
    }

    /// Parse a response from raw wire bytes (payload followed by SW1 SW2)
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 2 {
            return Err(Error::IncompleteResponse);
        }

        let (payload, sw) = data.split_at(data.len() - 2);
        let status = StatusWord::new(sw[0], sw[1]);

        trace!(
            status = %status,
            payload_len = payload.len(),
            "parsed APDU response"
        );

        Ok(Self {
            payload: if payload.is_empty() {
                None
            } else {
                Some(Bytes::copy_from_slice(payload))
            },
            status,
        })
    }

    /// The response payload, without the status word
    pub const fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// The response payload as a slice, empty when absent
    pub fn data(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// The status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is 90 00
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(data)
    }
}
