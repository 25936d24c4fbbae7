//! Transport trait for APDU communication with cards
//!
//! A transport is responsible for moving raw APDU bytes to a card and back.
//! It has no knowledge of command structure or card-specific encodings, and
//! it is the single point where a driver operation may block on hardware I/O.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::Error;

/// Trait for raw card transports
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes to the card and return the raw response,
    /// including the trailing status word
    ///
    /// Implementations must either complete the exchange or fail; partial
    /// responses are a transport defect.
    fn transmit(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        trace!(command = %hex::encode(command), "transmitting APDU");
        let result = self.do_transmit(command);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "received APDU response"),
            Err(e) => debug!(error = ?e, "transport error during transmission"),
        }
        result
    }

    /// Internal implementation of [`transmit`](Self::transmit)
    ///
    /// Concrete transports override this; callers go through `transmit` so
    /// every exchange is traced uniformly.
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, Error>;
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        (**self).do_transmit(command)
    }
}
