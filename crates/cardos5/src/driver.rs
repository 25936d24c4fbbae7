//! CardOS v5 driver facade
//!
//! [`Cardos5`] wraps the generic ISO 7816 base driver and the CardOS v4
//! helper, overriding the operations the v5 firmware encodes differently:
//! file selection and creation, FCP post-processing, security environments,
//! signature output and PIN reference handling, plus the proprietary
//! `card_ctl` surface.

use bytes::Bytes;
use cardos5_apdu_core::{CardTransport, Command, StatusWord};
use tracing::debug;

use crate::arl::parse_arl;
use crate::atr::CardType;
use crate::cardos4::{CardosV4, CARDOS_SW_ERRORS};
use crate::consts::{apdu, crt, tags, BACKTRACK_PIN};
use crate::error::{Error, Result};
use crate::fcp::{construct_fcp, find_tag, CREATE_DATA_CAP};
use crate::file::FileDescriptor;
use crate::iso7816::Iso7816;
use crate::ops::{
    Algorithm, CardCtl, CardCtlReply, CardOps, PinCommand, SecOperation, SecurityEnv,
};
use crate::sig::encode_ec_signature;
use crate::tlv::TlvBuf;

/// Marketing name reported for matched cards
pub const CARD_NAME: &str = "CardOS M5";

/// Response buffer size for ACCUMULATE OBJECT DATA
const ACCUMULATE_REPLY_CAP: u32 = 64;
/// Response buffer size for EXTRACT KEY
const EXTRACT_KEY_REPLY_CAP: u32 = 768;

/// Flags describing a registered algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmFlags(u32);

impl AlgorithmFlags {
    /// Raw RSA (no padding applied by the card)
    pub const RSA_RAW: Self = Self(0x0001);
    /// The card applies no hash before signing
    pub const RSA_HASH_NONE: Self = Self(0x0002);
    /// Raw ECDSA
    pub const ECDSA_RAW: Self = Self(0x0004);
    /// Keys can be generated on the card
    pub const ONBOARD_KEY_GEN: Self = Self(0x0008);

    /// Whether all flags in `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AlgorithmFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One algorithm the card supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    /// Algorithm family
    pub algorithm: Algorithm,
    /// Key size in bits
    pub bits: u32,
    /// Capability flags
    pub flags: AlgorithmFlags,
}

/// Card capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardCaps(u32);

impl CardCaps {
    /// The card accepts extended APDUs
    pub const APDU_EXT: Self = Self(0x0001);

    /// Whether all capabilities in `other` are present
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Algorithm family recorded by the current security environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CseAlgorithm {
    Unset,
    Rsa,
    Ec,
}

/// Driver for one mounted CardOS v5 card
#[derive(Debug)]
pub struct Cardos5<T> {
    base: Iso7816<T>,
    v4: CardosV4,
    card_type: CardType,
    caps: CardCaps,
    algorithms: Vec<AlgorithmInfo>,
    cse_algorithm: CseAlgorithm,
}

impl<T: CardTransport> Cardos5<T> {
    /// Match an ATR against the supported card table
    pub fn match_card(atr: &[u8]) -> Option<CardType> {
        CardType::from_atr(atr)
    }

    /// Create a driver for a card of a known type
    ///
    /// Registers the card's algorithm table and leaves the security
    /// environment unset. The per-card state lives for exactly as long as
    /// the returned value.
    pub fn new(transport: T, card_type: CardType) -> Self {
        let rsa_flags =
            AlgorithmFlags::RSA_RAW | AlgorithmFlags::RSA_HASH_NONE | AlgorithmFlags::ONBOARD_KEY_GEN;
        let ec_flags = AlgorithmFlags::ECDSA_RAW | AlgorithmFlags::ONBOARD_KEY_GEN;

        let mut algorithms = Vec::new();
        for bits in (512..=4096u32).step_by(256) {
            algorithms.push(AlgorithmInfo {
                algorithm: Algorithm::Rsa,
                bits,
                flags: rsa_flags,
            });
        }
        for bits in [192, 224, 256, 384, 512] {
            algorithms.push(AlgorithmInfo {
                algorithm: Algorithm::Ec,
                bits,
                flags: ec_flags,
            });
        }

        Self {
            base: Iso7816::with_sw_overrides(transport, CARDOS_SW_ERRORS),
            v4: CardosV4,
            card_type,
            caps: CardCaps::APDU_EXT,
            algorithms,
            cse_algorithm: CseAlgorithm::Unset,
        }
    }

    /// Create a driver by matching the card's ATR
    pub fn from_atr(transport: T, atr: &[u8]) -> Result<Self> {
        let card_type = Self::match_card(atr).ok_or_else(|| {
            debug!(atr = %hex::encode(atr), "unrecognized ATR");
            Error::InvalidArguments("unrecognized ATR")
        })?;
        Ok(Self::new(transport, card_type))
    }

    /// The firmware variant of the mounted card
    pub const fn card_type(&self) -> CardType {
        self.card_type
    }

    /// The card's display name
    pub const fn name(&self) -> &'static str {
        CARD_NAME
    }

    /// Card capabilities
    pub const fn caps(&self) -> CardCaps {
        self.caps
    }

    /// The registered algorithm table
    pub fn algorithms(&self) -> &[AlgorithmInfo] {
        &self.algorithms
    }

    fn accumulate_object_data(
        &mut self,
        append: bool,
        data: &[u8],
        hash_len: usize,
    ) -> Result<Vec<u8>> {
        let p1 = if append {
            apdu::ACCUMULATE_OBJECT_DATA_P1_APPEND
        } else {
            apdu::ACCUMULATE_OBJECT_DATA_P1_NEW
        };
        let command = Command::new(
            apdu::ACCUMULATE_OBJECT_DATA_CLA,
            apdu::ACCUMULATE_OBJECT_DATA_INS,
            p1,
            0x00,
        )
        .with_data(Bytes::copy_from_slice(data))
        .with_le(ACCUMULATE_REPLY_CAP);

        let response = self.base.transmit_checked(&command)?;
        let payload = response.data();
        // Two status bytes precede the running hash.
        if payload.len() != hash_len + 2 {
            debug!(got = payload.len(), want = hash_len + 2, "wrong reply length");
            return Err(Error::CardCmdFailed("unexpected reply length"));
        }
        Ok(payload[2..].to_vec())
    }

    fn generate_key(&mut self, data: &[u8]) -> Result<()> {
        let command = Command::new(
            0x00,
            apdu::GENERATE_KEY_INS,
            apdu::GENERATE_KEY_P1_GENERATE,
            0x00,
        )
        .with_data(Bytes::copy_from_slice(data));
        self.base.transmit_checked(&command).map(|_| ())
    }

    fn extract_key(&mut self, data: &[u8]) -> Result<Bytes> {
        let command = Command::new(
            0x00,
            apdu::GENERATE_KEY_INS,
            apdu::GENERATE_KEY_P1_EXTRACT,
            0x00,
        )
        .with_data(Bytes::copy_from_slice(data))
        .with_le(EXTRACT_KEY_REPLY_CAP)
        .extended();
        let response = self.base.transmit_checked(&command)?;
        Ok(response.payload().cloned().unwrap_or_default())
    }

    fn put_data_ecd(&mut self, data: &[u8]) -> Result<()> {
        let command = Command::new(
            0x00,
            apdu::PUT_DATA_INS,
            apdu::PUT_DATA_ECD_P1,
            apdu::PUT_DATA_ECD_P2,
        )
        .with_data(Bytes::copy_from_slice(data));
        self.base.transmit_checked(&command).map(|_| ())
    }

    fn init_card(&mut self) -> Result<()> {
        // Takes effect after the next reset; P1/P2 form the data field
        // length the card persists in EEPROM.
        let command = Command::new(
            apdu::SET_DATA_FIELD_LENGTH_CLA,
            apdu::SET_DATA_FIELD_LENGTH_INS,
            apdu::SET_DATA_FIELD_LENGTH_P1,
            apdu::SET_DATA_FIELD_LENGTH_P2,
        );
        self.base.transmit_checked(&command).map(|_| ())
    }
}

impl<T: CardTransport> CardOps for Cardos5<T> {
    fn select_file(&mut self, path: &[u8], want_fci: bool) -> Result<Option<FileDescriptor>> {
        if path.len() < 2 || path[0] != 0x3F || path[1] != 0x00 {
            debug!(path = %hex::encode(path), "path must be absolute");
            return Err(Error::InvalidArguments(
                "path must be absolute and start at the MF",
            ));
        }

        // Selecting the bare MF goes by file id; anything deeper is sent as
        // a path relative to the MF.
        let (p1, data) = if path.len() == 2 {
            (apdu::SELECT_P1_FILE_ID, path)
        } else {
            (apdu::SELECT_P1_FULL_PATH, &path[2..])
        };

        let p2 = if want_fci {
            apdu::SELECT_P2_FCI
        } else {
            apdu::SELECT_P2_NO_RESPONSE
        };
        let mut command =
            Command::new(0x00, apdu::SELECT_INS, p1, p2).with_data(Bytes::copy_from_slice(data));
        if want_fci {
            command = command.with_le(256);
        }

        let response = self.base.transmit(&command)?;
        self.check_sw(response.status())?;

        if !want_fci {
            return Ok(None);
        }

        // The card answers with a BER-TLV coded FCI envelope; only the
        // 1-byte and 2-byte long length forms occur.
        let fci = response.data();
        if fci.len() < 2 || fci[0] != tags::FCI_TEMPLATE || (fci[1] != 0x81 && fci[1] != 0x82) {
            debug!("invalid FCI envelope");
            return Err(Error::UnknownDataReceived);
        }

        let content = if fci[1] == 0x81 {
            let len = fci[2] as usize;
            if fci.len() < 3 + len {
                return Err(Error::UnknownDataReceived);
            }
            &fci[3..3 + len]
        } else {
            if fci.len() < 4 {
                return Err(Error::UnknownDataReceived);
            }
            let len = ((fci[2] as usize) << 8) | fci[3] as usize;
            if fci.len() < 4 + len {
                return Err(Error::UnknownDataReceived);
            }
            &fci[4..4 + len]
        };

        // Descriptors without a file descriptor byte (the MF's minimal FCI)
        // default to the DF kind.
        let mut file = FileDescriptor::new_df(0, 0);
        self.process_fci(&mut file, content)?;

        let sec_attr = file.sec_attr().cloned();
        if let Err(e) = parse_arl(&mut file, sec_attr.as_deref().unwrap_or(&[])) {
            debug!("could not parse access rule list");
            return Err(e);
        }

        Ok(Some(file))
    }

    fn create_file(&mut self, file: &FileDescriptor) -> Result<()> {
        let mut buf = [0u8; CREATE_DATA_CAP];
        let mut fcp = TlvBuf::new(&mut buf);
        construct_fcp(file, &mut fcp)?;

        let command = Command::new(0x00, apdu::CREATE_FILE_INS, 0x00, 0x00)
            .with_data(Bytes::copy_from_slice(fcp.as_slice()));
        self.base.transmit_checked(&command).map(|_| ())
    }

    fn process_fci(&self, file: &mut FileDescriptor, fcp: &[u8]) -> Result<()> {
        self.base.process_fci(file, fcp)?;

        if let Some(attr) = find_tag(fcp, tags::SEC_ATTR) {
            if !attr.is_empty() {
                file.set_sec_attr(attr);
            }
        }

        Ok(())
    }

    fn read_binary(&mut self, offset: u16, len: usize) -> Result<Bytes> {
        self.base.read_binary(offset, len)
    }

    fn write_binary(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        self.base.write_binary(offset, data)
    }

    fn update_binary(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        self.base.update_binary(offset, data)
    }

    fn set_security_env(&mut self, env: &SecurityEnv) -> Result<()> {
        self.cse_algorithm = CseAlgorithm::Unset;

        let p2 = match env.operation {
            SecOperation::Sign => apdu::MSE_P2_SIGN,
            SecOperation::Decipher => apdu::MSE_P2_DECIPHER,
        };

        let mut crt_buf = [0u8; 16];
        let mut crt_tlv = TlvBuf::new(&mut crt_buf);
        crt_tlv.put_tag1(crt::TAG_KEYREF, env.key_ref)?;
        crt_tlv.put_tag1(crt::TAG_KUQ, crt::KUQ_DECRYPT)?;

        let command = Command::new(0x00, apdu::MSE_INS, apdu::MSE_P1_SET, p2)
            .with_data(Bytes::copy_from_slice(crt_tlv.as_slice()));
        self.base.transmit_checked(&command)?;

        self.cse_algorithm = match env.algorithm {
            Algorithm::Rsa => CseAlgorithm::Rsa,
            Algorithm::Ec => CseAlgorithm::Ec,
        };
        Ok(())
    }

    fn restore_security_env(&mut self, _se_num: u8) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn compute_signature(&mut self, data: &[u8], out: &mut [u8]) -> Result<usize> {
        let algorithm = match self.cse_algorithm {
            CseAlgorithm::Unset => {
                debug!("no security environment set");
                return Err(Error::InvalidArguments("security environment not set"));
            }
            CseAlgorithm::Rsa => Algorithm::Rsa,
            CseAlgorithm::Ec => Algorithm::Ec,
        };

        if data.is_empty() {
            return Err(Error::InvalidArguments("nothing to sign"));
        }
        if out.len() < data.len() {
            debug!(outlen = out.len(), "output buffer smaller than input");
            return Err(Error::BufferTooSmall);
        }

        let le = out.len().min(65536) as u32;
        let command = Command::new(0x00, apdu::PSO_INS, apdu::PSO_P1_SIGN, apdu::PSO_P2_SIGN)
            .with_data(Bytes::copy_from_slice(data))
            .with_le(le)
            .extended();

        let response = self.base.transmit(&command)?;
        self.check_sw(response.status())?;

        let raw = response.data();
        if raw.len() > out.len() {
            debug!(len = raw.len(), "signature reply exceeds requested length");
            return Err(Error::WrongLength);
        }

        match algorithm {
            Algorithm::Rsa => {
                out[..raw.len()].copy_from_slice(raw);
                Ok(raw.len())
            }
            Algorithm::Ec => encode_ec_signature(self.card_type, raw, out),
        }
    }

    fn pin_cmd(&mut self, cmd: &mut PinCommand) -> Result<()> {
        if cmd.reference & BACKTRACK_PIN != 0 {
            debug!(reference = cmd.reference, "pin reference with backtrack bit set");
            return Err(Error::IncorrectParameters(
                "pin reference already carries the backtrack bit",
            ));
        }

        // The card searches parent DFs for the PIN only when asked to.
        cmd.reference |= BACKTRACK_PIN;

        self.base.pin_cmd(cmd)
    }

    fn card_ctl(&mut self, ctl: CardCtl<'_>) -> Result<CardCtlReply> {
        match ctl {
            CardCtl::AccumulateObjectData {
                append,
                data,
                hash_len,
            } => self
                .accumulate_object_data(append, data, hash_len)
                .map(CardCtlReply::Hash),
            CardCtl::GenerateKey { data } => {
                self.generate_key(data).map(|()| CardCtlReply::Done)
            }
            CardCtl::ExtractKey { data } => self.extract_key(data).map(CardCtlReply::Key),
            CardCtl::PutDataEcd { data } => {
                self.put_data_ecd(data).map(|()| CardCtlReply::Done)
            }
            CardCtl::InitCard => self.init_card().map(|()| CardCtlReply::Done),
            CardCtl::PutDataOci { data } => self
                .v4
                .put_data_oci(&mut self.base, data)
                .map(|()| CardCtlReply::Done),
            CardCtl::PutDataSeci { data } => self
                .v4
                .put_data_seci(&mut self.base, data)
                .map(|()| CardCtlReply::Done),
            CardCtl::LifecycleGet => self
                .v4
                .lifecycle_get(&mut self.base)
                .map(CardCtlReply::Lifecycle),
            CardCtl::LifecycleSet { target } => self
                .v4
                .lifecycle_set(&mut self.base, target)
                .map(|()| CardCtlReply::Done),
        }
    }

    fn list_files(&mut self) -> Result<Vec<u16>> {
        Err(Error::NotSupported)
    }

    fn get_data(&mut self, _tag: u16, _out: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    fn check_sw(&self, status: StatusWord) -> Result<()> {
        self.base.check_sw(status)
    }

    fn logout(&mut self) -> Result<()> {
        self.v4.logout(&mut self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_registration() {
        #[derive(Debug)]
        struct NoCard;
        impl CardTransport for NoCard {
            fn do_transmit(
                &mut self,
                _command: &[u8],
            ) -> std::result::Result<Bytes, cardos5_apdu_core::Error> {
                Err(cardos5_apdu_core::Error::Transmission)
            }
        }

        let card = Cardos5::new(NoCard, CardType::V5_3);
        let rsa: Vec<u32> = card
            .algorithms()
            .iter()
            .filter(|a| a.algorithm == Algorithm::Rsa)
            .map(|a| a.bits)
            .collect();
        assert_eq!(rsa.first(), Some(&512));
        assert_eq!(rsa.last(), Some(&4096));
        assert_eq!(rsa.len(), 15);
        assert!(rsa.windows(2).all(|w| w[1] - w[0] == 256));

        let ec: Vec<u32> = card
            .algorithms()
            .iter()
            .filter(|a| a.algorithm == Algorithm::Ec)
            .map(|a| a.bits)
            .collect();
        assert_eq!(ec, [192, 224, 256, 384, 512]);

        assert!(card.caps().contains(CardCaps::APDU_EXT));
        assert!(card
            .algorithms()
            .iter()
            .all(|a| a.flags.contains(AlgorithmFlags::ONBOARD_KEY_GEN)));
        assert_eq!(card.name(), CARD_NAME);
    }
}
