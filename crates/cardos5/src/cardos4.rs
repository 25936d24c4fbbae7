//! CardOS v4 sibling helper
//!
//! CardOS v5 shares part of its proprietary surface with its v4 predecessor:
//! the status word vocabulary, logout, PUT DATA with object/security
//! environment control information, and life cycle control. The v5 driver
//! delegates those operations here instead of reimplementing them.

use bytes::Bytes;
use cardos5_apdu_core::{CardTransport, Command};
use tracing::debug;

use crate::consts::apdu;
use crate::error::{Error, Result};
use crate::iso7816::Iso7816;
use crate::ops::Lifecycle;

/// Proprietary CardOS status words, consulted before the ISO interpretation
pub(crate) static CARDOS_SW_ERRORS: &[(u16, &'static str)] = &[
    (0x6581, "EEPROM error, command aborted"),
    (0x6700, "LC invalid"),
    (0x6981, "file too small"),
    (0x6985, "requested function blocked"),
    (0x6F81, "file invalid"),
    (0x6F82, "not enough memory"),
    (0x6F84, "general protection fault"),
    (0x6F85, "internal assertion failed"),
    (0x6F86, "unknown file type"),
    (0x6F87, "unknown life cycle phase"),
    (0x6FFF, "internal error"),
];

/// Life cycle phase byte in the card's GET DATA response
const PHASE_USER: u8 = 0x10;
const PHASE_ADMIN: u8 = 0x20;
const PHASE_MANUFACTURING: u8 = 0x34;
const PHASE_DEATH: u8 = 0x26;

/// Stateless helper realizing the shared CardOS v4 operations
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CardosV4;

impl CardosV4 {
    /// Drop the card's authentication state by re-selecting the MF
    pub(crate) fn logout<T: CardTransport>(&self, iso: &mut Iso7816<T>) -> Result<()> {
        let command = Command::new(
            0x00,
            apdu::SELECT_INS,
            apdu::SELECT_P1_FILE_ID,
            apdu::SELECT_P2_NO_RESPONSE,
        )
        .with_data(Bytes::from_static(&[0x3F, 0x00]));
        iso.transmit_checked(&command).map(|_| ())
    }

    /// PUT DATA with object control information
    pub(crate) fn put_data_oci<T: CardTransport>(
        &self,
        iso: &mut Iso7816<T>,
        data: &[u8],
    ) -> Result<()> {
        let command = Command::new(
            0x00,
            apdu::PUT_DATA_INS,
            apdu::PUT_DATA_OCI_P1,
            apdu::PUT_DATA_OCI_P2,
        )
        .with_data(Bytes::copy_from_slice(data));
        iso.transmit_checked(&command).map(|_| ())
    }

    /// PUT DATA with security environment control information
    pub(crate) fn put_data_seci<T: CardTransport>(
        &self,
        iso: &mut Iso7816<T>,
        data: &[u8],
    ) -> Result<()> {
        let command = Command::new(
            0x00,
            apdu::PUT_DATA_INS,
            apdu::PUT_DATA_SECI_P1,
            apdu::PUT_DATA_SECI_P2,
        )
        .with_data(Bytes::copy_from_slice(data));
        iso.transmit_checked(&command).map(|_| ())
    }

    /// Read the current life cycle phase
    pub(crate) fn lifecycle_get<T: CardTransport>(
        &self,
        iso: &mut Iso7816<T>,
    ) -> Result<Lifecycle> {
        let command = Command::new(
            0x00,
            apdu::GET_DATA_INS,
            apdu::LIFE_CYCLE_P1,
            apdu::LIFE_CYCLE_P2,
        )
        .with_le(1);
        let response = iso.transmit_checked(&command)?;

        match response.data().first() {
            Some(&PHASE_USER) => Ok(Lifecycle::User),
            Some(&PHASE_ADMIN) => Ok(Lifecycle::Admin),
            Some(&PHASE_MANUFACTURING) | Some(&PHASE_DEATH) => Ok(Lifecycle::Other),
            phase => {
                debug!(?phase, "unrecognized life cycle phase");
                Err(Error::UnknownDataReceived)
            }
        }
    }

    /// Move the card into a life cycle phase
    ///
    /// PHASE CONTROL only toggles between the administration and operational
    /// phases, so the current phase is read first and the toggle issued only
    /// when it differs from the target.
    pub(crate) fn lifecycle_set<T: CardTransport>(
        &self,
        iso: &mut Iso7816<T>,
        target: Lifecycle,
    ) -> Result<()> {
        if matches!(target, Lifecycle::Other) {
            return Err(Error::InvalidArguments("cannot enter this phase"));
        }

        if self.lifecycle_get(iso)? == target {
            return Ok(());
        }

        let command = Command::new(
            apdu::PHASE_CONTROL_CLA,
            apdu::PHASE_CONTROL_INS,
            apdu::PHASE_CONTROL_P1_TOGGLE,
            apdu::PHASE_CONTROL_P2_TOGGLE,
        );
        iso.transmit_checked(&command).map(|_| ())
    }
}
