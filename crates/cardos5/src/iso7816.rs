//! Generic ISO 7816 base driver
//!
//! [`Iso7816`] owns the card transport and provides the baseline operations
//! a card driver inherits: FCP parsing, PIN commands, transparent-file I/O
//! and status word checking. Card drivers wrap it and override what their
//! card does differently; proprietary status word vocabularies are injected
//! at construction instead of living in a global table.

use bytes::Bytes;
use cardos5_apdu_core::{CardTransport, Command, Response, StatusWord};
use tracing::debug;

use crate::consts::{apdu, tags};
use crate::error::{Error, Result};
use crate::fcp::read_tlv;
use crate::file::{EfStructure, FileDescriptor, FileKind};
use crate::ops::{CardCtl, CardCtlReply, CardOps, PinCommand, PinOperation, SecurityEnv};

/// Generic ISO 7816 driver over a card transport
#[derive(Debug)]
pub struct Iso7816<T> {
    transport: T,
    sw_overrides: &'static [(u16, &'static str)],
}

impl<T: CardTransport> Iso7816<T> {
    /// Create a base driver speaking plain ISO 7816
    pub fn new(transport: T) -> Self {
        Self::with_sw_overrides(transport, &[])
    }

    /// Create a base driver that additionally understands a proprietary
    /// status word vocabulary, consulted before the ISO interpretation
    pub fn with_sw_overrides(
        transport: T,
        sw_overrides: &'static [(u16, &'static str)],
    ) -> Self {
        Self {
            transport,
            sw_overrides,
        }
    }

    /// Exchange one APDU
    pub(crate) fn transmit(&mut self, command: &Command) -> Result<Response> {
        let bytes = command.to_bytes()?;
        let raw = self.transport.transmit(&bytes)?;
        Ok(Response::from_bytes(&raw)?)
    }

    /// Exchange one APDU and fail on a non-success status word
    pub(crate) fn transmit_checked(&mut self, command: &Command) -> Result<Response> {
        let response = self.transmit(command)?;
        self.check_sw(response.status())?;
        Ok(response)
    }
}

impl<T: CardTransport> CardOps for Iso7816<T> {
    fn select_file(&mut self, path: &[u8], want_fci: bool) -> Result<Option<FileDescriptor>> {
        if path.is_empty() {
            return Err(Error::InvalidArguments("empty path"));
        }

        let p2 = if want_fci {
            apdu::SELECT_P2_FCI
        } else {
            apdu::SELECT_P2_NO_RESPONSE
        };
        let mut command = Command::new(0x00, apdu::SELECT_INS, apdu::SELECT_P1_FULL_PATH, p2)
            .with_data(Bytes::copy_from_slice(path));
        if want_fci {
            command = command.with_le(256);
        }

        let response = self.transmit_checked(&command)?;
        if !want_fci {
            return Ok(None);
        }

        let Some((tags::FCI_TEMPLATE, content, _)) = read_tlv(response.data()) else {
            debug!("malformed FCI envelope");
            return Err(Error::UnknownDataReceived);
        };

        let mut file = FileDescriptor::new_df(0, 0);
        self.process_fci(&mut file, content)?;
        Ok(Some(file))
    }

    fn create_file(&mut self, _file: &FileDescriptor) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn process_fci(&self, file: &mut FileDescriptor, fcp: &[u8]) -> Result<()> {
        let mut rest = fcp;
        while !rest.is_empty() {
            let Some((tag, content, next)) = read_tlv(rest) else {
                debug!(remaining = rest.len(), "stopping at malformed FCP tail");
                break;
            };

            match tag {
                0x80 | tags::SIZE => {
                    if content.len() == 2 {
                        file.size = u16::from_be_bytes([content[0], content[1]]) as usize;
                    }
                }
                tags::DESCRIPTOR => match content.first() {
                    Some(&tags::TYPE_DF) => file.kind = FileKind::Df,
                    Some(&tags::TYPE_BINARY_EF) => {
                        file.kind = FileKind::WorkingEf;
                        file.ef_structure = EfStructure::Transparent;
                    }
                    other => debug!(descriptor = ?other, "unrecognized file descriptor"),
                },
                tags::FILE_ID => {
                    if content.len() == 2 {
                        file.id = u16::from_be_bytes([content[0], content[1]]);
                    }
                }
                tags::DF_NAME => file.name = Some(content.to_vec()),
                tags::LIFE_CYCLE => file.life_cycle = content.first().copied(),
                _ => {}
            }

            rest = next;
        }

        Ok(())
    }

    fn read_binary(&mut self, offset: u16, len: usize) -> Result<Bytes> {
        if offset & 0x8000 != 0 {
            return Err(Error::InvalidArguments("offset exceeds 15 bits"));
        }
        if len == 0 || len > 256 {
            return Err(Error::InvalidArguments("read length out of range"));
        }

        let [p1, p2] = offset.to_be_bytes();
        let command =
            Command::new(0x00, apdu::READ_BINARY_INS, p1, p2).with_le(len as u32);
        let response = self.transmit_checked(&command)?;
        Ok(response.payload().cloned().unwrap_or_default())
    }

    fn write_binary(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        if offset & 0x8000 != 0 {
            return Err(Error::InvalidArguments("offset exceeds 15 bits"));
        }
        if data.is_empty() || data.len() > 255 {
            return Err(Error::InvalidArguments("write length out of range"));
        }

        let [p1, p2] = offset.to_be_bytes();
        let command = Command::new(0x00, apdu::WRITE_BINARY_INS, p1, p2)
            .with_data(Bytes::copy_from_slice(data));
        self.transmit_checked(&command).map(|_| ())
    }

    fn update_binary(&mut self, offset: u16, data: &[u8]) -> Result<()> {
        if offset & 0x8000 != 0 {
            return Err(Error::InvalidArguments("offset exceeds 15 bits"));
        }
        if data.is_empty() || data.len() > 255 {
            return Err(Error::InvalidArguments("update length out of range"));
        }

        let [p1, p2] = offset.to_be_bytes();
        let command = Command::new(0x00, apdu::UPDATE_BINARY_INS, p1, p2)
            .with_data(Bytes::copy_from_slice(data));
        self.transmit_checked(&command).map(|_| ())
    }

    fn set_security_env(&mut self, _env: &SecurityEnv) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn restore_security_env(&mut self, _se_num: u8) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn compute_signature(&mut self, _data: &[u8], _out: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    fn pin_cmd(&mut self, cmd: &mut PinCommand) -> Result<()> {
        let ins = match cmd.operation {
            PinOperation::Verify => apdu::VERIFY_INS,
            PinOperation::Change => apdu::CHANGE_REFERENCE_DATA_INS,
            PinOperation::Unblock => apdu::RESET_RETRY_COUNTER_INS,
        };

        let mut data = cmd.pin.clone();
        match cmd.operation {
            PinOperation::Verify => {}
            PinOperation::Change | PinOperation::Unblock => {
                if let Some(new_pin) = &cmd.new_pin {
                    data.extend_from_slice(new_pin);
                } else if cmd.operation == PinOperation::Change {
                    return Err(Error::InvalidArguments("change requires a new pin"));
                }
            }
        }

        let command = Command::new(0x00, ins, 0x00, cmd.reference).with_data(data);
        let response = self.transmit(&command)?;
        if let Some(tries) = response.status().pin_tries_left() {
            cmd.tries_left = Some(tries);
        }
        self.check_sw(response.status())
    }

    fn card_ctl(&mut self, _ctl: CardCtl<'_>) -> Result<CardCtlReply> {
        Err(Error::NotSupported)
    }

    fn list_files(&mut self) -> Result<Vec<u16>> {
        Err(Error::NotSupported)
    }

    fn get_data(&mut self, _tag: u16, _out: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupported)
    }

    fn check_sw(&self, status: StatusWord) -> Result<()> {
        if status.is_success() || status.is_more_data_available() {
            return Ok(());
        }

        let message = self
            .sw_overrides
            .iter()
            .find(|(sw, _)| *sw == status.to_u16())
            .map_or_else(|| status.description(), |(_, message)| *message);
        Err(Error::card(status, message))
    }

    fn logout(&mut self) -> Result<()> {
        Err(Error::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct Scripted {
        replies: VecDeque<Bytes>,
        sent: Vec<Vec<u8>>,
    }

    impl Scripted {
        fn replying(replies: &[&[u8]]) -> Self {
            Self {
                replies: replies.iter().map(|r| Bytes::copy_from_slice(r)).collect(),
                sent: Vec::new(),
            }
        }
    }

    impl CardTransport for Scripted {
        fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, cardos5_apdu_core::Error> {
            self.sent.push(command.to_vec());
            self.replies
                .pop_front()
                .ok_or(cardos5_apdu_core::Error::Transmission)
        }
    }

    #[test]
    fn verify_pin_apdu_and_tries_left() {
        let mut iso = Iso7816::new(Scripted::replying(&[&[0x63, 0xC2]]));
        let mut cmd = PinCommand::verify(0x81, b"123456".to_vec());
        let err = iso.pin_cmd(&mut cmd).unwrap_err();

        assert_eq!(cmd.tries_left, Some(2));
        assert!(matches!(err, Error::Card { status, .. } if status.to_u16() == 0x63C2));
        assert_eq!(
            iso.transport.sent[0],
            [0x00, 0x20, 0x00, 0x81, 0x06, b'1', b'2', b'3', b'4', b'5', b'6']
        );
    }

    #[test]
    fn change_pin_concatenates_old_and_new() {
        let mut iso = Iso7816::new(Scripted::replying(&[&[0x90, 0x00]]));
        let mut cmd = PinCommand {
            operation: PinOperation::Change,
            reference: 0x01,
            pin: vec![0x31, 0x32],
            new_pin: Some(vec![0x33, 0x34]),
            tries_left: None,
        };
        iso.pin_cmd(&mut cmd).unwrap();
        assert_eq!(
            iso.transport.sent[0],
            [0x00, 0x24, 0x00, 0x01, 0x04, 0x31, 0x32, 0x33, 0x34]
        );
    }

    #[test]
    fn read_binary_apdu() {
        let mut iso = Iso7816::new(Scripted::replying(&[&[0xAA, 0xBB, 0x90, 0x00]]));
        let data = iso.read_binary(0x0102, 2).unwrap();
        assert_eq!(data.as_ref(), &[0xAA, 0xBB]);
        assert_eq!(iso.transport.sent[0], [0x00, 0xB0, 0x01, 0x02, 0x02]);

        assert!(iso.read_binary(0x8000, 2).is_err());
    }

    #[test]
    fn process_fci_extracts_fields() {
        let iso = Iso7816::new(Scripted::default());
        let fcp = [
            0x82, 0x01, 0x01, // transparent EF
            0x81, 0x02, 0x02, 0x00, // size 512
            0x83, 0x02, 0x50, 0x31, // id
            0x8A, 0x01, 0x05, // life cycle
            0xAB, 0x03, 0x80, 0x01, 0xFF, // security attribute, skipped here
        ];
        let mut file = FileDescriptor::new_df(0, 0);
        iso.process_fci(&mut file, &fcp).unwrap();

        assert_eq!(file.kind, FileKind::WorkingEf);
        assert_eq!(file.size, 512);
        assert_eq!(file.id, 0x5031);
        assert_eq!(file.life_cycle, Some(0x05));
    }

    #[test]
    fn check_sw_prefers_overrides() {
        static OVERRIDES: &[(u16, &str)] = &[(0x6F81, "file invalid")];
        let iso = Iso7816::with_sw_overrides(Scripted::default(), OVERRIDES);

        assert!(iso.check_sw(StatusWord::new(0x90, 0x00)).is_ok());
        assert!(iso.check_sw(StatusWord::new(0x61, 0x10)).is_ok());

        let err = iso.check_sw(StatusWord::new(0x6F, 0x81)).unwrap_err();
        assert_eq!(
            err,
            Error::Card {
                status: StatusWord::new(0x6F, 0x81),
                message: "file invalid"
            }
        );

        let err = iso.check_sw(StatusWord::new(0x6A, 0x82)).unwrap_err();
        assert!(matches!(err, Error::Card { message: "file not found", .. }));
    }

    #[test]
    fn base_select_parses_fci_envelope() {
        let mut iso = Iso7816::new(Scripted::replying(&[&[
            0x6F, 0x07, 0x82, 0x01, 0x38, 0x83, 0x02, 0x50, 0x00, 0x90, 0x00,
        ]]));
        let file = iso.select_file(&[0x50, 0x00], true).unwrap().unwrap();
        assert_eq!(file.kind, FileKind::Df);
        assert_eq!(file.id, 0x5000);
        assert_eq!(
            iso.transport.sent[0],
            [0x00, 0xA4, 0x08, 0x00, 0x02, 0x50, 0x00, 0x00]
        );
    }
}
