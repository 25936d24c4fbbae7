//! End-to-end driver tests against a scripted transport
//!
//! Each test mounts a driver over a transport that replays canned card
//! responses and records every APDU sent, then checks both the wire bytes
//! and the driver's interpretation of the replies.

use std::collections::VecDeque;

use bytes::Bytes;
use cardos5::consts::am;
use cardos5::{
    AclMethod, AclOp, Algorithm, CardCtl, CardCtlReply, CardOps, CardType, Cardos5, Error,
    FileDescriptor, FileKind, Lifecycle, PinCommand, SecOperation, SecurityEnv,
};
use cardos5_apdu_core::{CardTransport, Error as ApduError, StatusWord};

#[derive(Debug, Default)]
struct ScriptedCard {
    replies: VecDeque<Bytes>,
    sent: Vec<Vec<u8>>,
}

impl ScriptedCard {
    fn new() -> Self {
        Self::default()
    }

    fn expect(mut self, reply: &[u8]) -> Self {
        self.replies.push_back(Bytes::copy_from_slice(reply));
        self
    }
}

impl CardTransport for ScriptedCard {
    fn do_transmit(&mut self, command: &[u8]) -> Result<Bytes, ApduError> {
        self.sent.push(command.to_vec());
        self.replies.pop_front().ok_or(ApduError::Transmission)
    }
}

fn ok(payload: &[u8]) -> Vec<u8> {
    let mut reply = payload.to_vec();
    reply.extend_from_slice(&[0x90, 0x00]);
    reply
}

#[test]
fn select_mf_decodes_compact_allow_everything_rule() {
    let mut card_io = ScriptedCard::new().expect(&[
        0x6F, 0x81, 0x05, 0xAB, 0x03, 0x80, 0x01, 0xFF, 0x90, 0x00,
    ]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let file = card.select_file(&[0x3F, 0x00], true).unwrap().unwrap();
    drop(card);

    assert_eq!(
        card_io.sent[0],
        [0x00, 0xA4, 0x00, 0x00, 0x02, 0x3F, 0x00, 0x00]
    );

    assert_eq!(file.kind, FileKind::Df);
    assert_eq!(file.sec_attr().unwrap().as_ref(), &[0x80, 0x01, 0xFF]);
    assert_eq!(file.acl().len(), 8);
    for op in [
        AclOp::Delete,
        AclOp::Rehabilitate,
        AclOp::Invalidate,
        AclOp::Create,
        AclOp::Update,
    ] {
        assert_eq!(file.acl_entry(op).unwrap().method, AclMethod::Always);
    }
}

#[test]
fn select_by_path_strips_the_mf_prefix() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let file = card.select_file(&[0x3F, 0x00, 0x50, 0x15], false).unwrap();
    drop(card);

    assert!(file.is_none());
    assert_eq!(card_io.sent[0], [0x00, 0xA4, 0x08, 0x0C, 0x02, 0x50, 0x15]);
}

#[test]
fn select_rejects_relative_paths() {
    let mut card_io = ScriptedCard::new();
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    for path in [&[0x50, 0x15][..], &[0x3F][..], &[][..]] {
        assert!(matches!(
            card.select_file(path, true),
            Err(Error::InvalidArguments(_))
        ));
    }
    drop(card);
    assert!(card_io.sent.is_empty());
}

#[test]
fn select_rejects_malformed_fci_envelope() {
    // Short-form length in the envelope is not what this card sends.
    let mut card_io = ScriptedCard::new().expect(&ok(&[0x6F, 0x05, 0xAB, 0x03, 0x80, 0x01, 0xFF]));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    assert_eq!(
        card.select_file(&[0x3F, 0x00], true),
        Err(Error::UnknownDataReceived)
    );
}

#[test]
fn select_surfaces_card_status_words() {
    let mut card_io = ScriptedCard::new().expect(&[0x6A, 0x82]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    let err = card.select_file(&[0x3F, 0x00, 0x12, 0x34], false).unwrap_err();
    assert!(matches!(
        err,
        Error::Card { status, .. } if status == StatusWord::new(0x6A, 0x82)
    ));
}

#[test]
fn select_decodes_ef_acl_and_strips_backtrack_bit() {
    // Transparent EF of 256 bytes, readable by everyone, updatable after
    // verification of PIN 1 (reported with the backtrack bit set).
    let fcp = [
        0x82, 0x01, 0x01, //
        0x81, 0x02, 0x01, 0x00, //
        0x83, 0x02, 0x50, 0x31, //
        0xAB, 0x10, //
        0x80, 0x01, am::EF_READ, 0x90, 0x00, //
        0x80, 0x01, am::EF_UPDATE, 0xA4, 0x06, 0x83, 0x01, 0x81, 0x95, 0x01, 0x08,
    ];
    let mut reply = vec![0x6F, 0x81, fcp.len() as u8];
    reply.extend_from_slice(&fcp);

    let mut card_io = ScriptedCard::new().expect(&ok(&reply));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let file = card
        .select_file(&[0x3F, 0x00, 0x50, 0x31], true)
        .unwrap()
        .unwrap();

    assert_eq!(file.kind, FileKind::WorkingEf);
    assert_eq!(file.id, 0x5031);
    assert_eq!(file.size, 256);
    assert_eq!(
        file.acl_entry(AclOp::Read).unwrap().method,
        AclMethod::Always
    );
    assert_eq!(
        file.acl_entry(AclOp::Update).unwrap().method,
        AclMethod::Chv { pin_ref: 0x01 }
    );
}

#[test]
fn select_fails_on_unsupported_access_rules() {
    let fcp = [
        0x82, 0x01, 0x01, //
        0xAB, 0x05, 0x80, 0x01, 0x77, 0x90, 0x00, // unknown access mode byte
    ];
    let mut reply = vec![0x6F, 0x81, fcp.len() as u8];
    reply.extend_from_slice(&fcp);

    let mut card_io = ScriptedCard::new().expect(&ok(&reply));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    assert_eq!(
        card.select_file(&[0x3F, 0x00, 0x50, 0x31], true),
        Err(Error::NoCardSupport)
    );
}

#[test]
fn create_ef_sends_the_expected_fcp() {
    let file = {
        let mut f = FileDescriptor::new_ef(0x5031, 256);
        f.add_acl_entry(AclOp::Read, AclMethod::Always);
        f.add_acl_entry(AclOp::Update, AclMethod::Chv { pin_ref: 1 });
        f.add_acl_entry(AclOp::Delete, AclMethod::Never);
        f
    };

    let arl: Vec<u8> = [
        &[0x80, 0x01, am::EF_DELETE, 0x97, 0x00][..],
        &[0x80, 0x01, am::EF_TERMINATE, 0x97, 0x00],
        &[0x80, 0x01, am::EF_ACTIVATE, 0x97, 0x00],
        &[0x80, 0x01, am::EF_DEACTIVATE, 0x97, 0x00],
        &[0x80, 0x01, am::EF_WRITE, 0x97, 0x00],
        &[0x80, 0x01, am::EF_UPDATE, 0xA4, 0x06, 0x83, 0x01, 0x01, 0x95, 0x01, 0x08],
        &[0x80, 0x01, am::EF_READ, 0x90, 0x00],
        &[0x80, 0x01, am::EF_INCREASE, 0x97, 0x00],
        &[0x80, 0x01, am::EF_DECREASE, 0x97, 0x00],
    ]
    .concat();

    let body: Vec<u8> = [
        &[0x82, 0x01, 0x01][..],
        &[0x81, 0x02, 0x01, 0x00],
        &[0x88, 0x00],
        &[0xAB, arl.len() as u8],
        &arl[..],
        &[0x83, 0x02, 0x50, 0x31],
    ]
    .concat();

    let mut expected = vec![0x00, 0xE0, 0x00, 0x00, (body.len() + 2) as u8, 0x62];
    expected.push(body.len() as u8);
    expected.extend_from_slice(&body);

    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    card.create_file(&file).unwrap();
    drop(card);

    assert_eq!(card_io.sent[0], expected);
}

#[test]
fn create_df_grants_put_data_ecd_for_update_acls() {
    let file = FileDescriptor::new_df(0x5000, 2048)
        .with_name(*b"test-df")
        .with_acl_entry(AclOp::Update, AclMethod::Chv { pin_ref: 3 });

    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    card.create_file(&file).unwrap();
    drop(card);

    let sent = &card_io.sent[0];
    assert_eq!(&sent[..4], &[0x00, 0xE0, 0x00, 0x00]);
    assert_eq!(sent[5], 0x62);

    let fragments: [&[u8]; 4] = [
        &[0x82, 0x01, 0x38],                   // DF descriptor
        &[0x84, 0x07, b't', b'e', b's', b't', b'-', b'd', b'f'], // name
        &[0x84, 0x04, 0x00, 0xDA, 0x01, 0x6C], // PUT DATA (ECD) grant
        &[0x84, 0x04, 0x80, 0x10, 0x00, 0x00, 0x90, 0x00], // PHASE CONTROL grant
    ];
    for fragment in fragments {
        assert!(
            sent.windows(fragment.len()).any(|w| w == fragment),
            "fragment {:02x?} missing",
            fragment
        );
    }
}

#[test]
fn rsa_signature_passes_through_untouched() {
    let signature = [0x5A; 128];
    let mut card_io = ScriptedCard::new()
        .expect(&[0x90, 0x00])
        .expect(&ok(&signature));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    card.set_security_env(&SecurityEnv {
        operation: SecOperation::Sign,
        algorithm: Algorithm::Rsa,
        key_ref: 0x10,
    })
    .unwrap();

    let digest = [0x11; 32];
    let mut out = [0u8; 256];
    let written = card.compute_signature(&digest, &mut out).unwrap();
    drop(card);

    assert_eq!(
        card_io.sent[0],
        [0x00, 0x22, 0x41, 0xB6, 0x06, 0x84, 0x01, 0x10, 0x95, 0x01, 0x40]
    );

    let pso = &card_io.sent[1];
    assert_eq!(&pso[..7], &[0x00, 0x2A, 0x9E, 0x9A, 0x00, 0x00, 0x20]);
    assert_eq!(&pso[7..39], &digest);
    assert_eq!(&pso[39..], &[0x01, 0x00]); // Le = 256, extended

    assert_eq!(written, signature.len());
    assert_eq!(&out[..written], &signature);
    assert!(out[written..].iter().all(|&b| b == 0));
}

#[test]
fn decipher_environment_uses_the_confidentiality_template() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    card.set_security_env(&SecurityEnv {
        operation: SecOperation::Decipher,
        algorithm: Algorithm::Rsa,
        key_ref: 0x02,
    })
    .unwrap();
    drop(card);
    assert_eq!(card_io.sent[0][3], 0xB8);
}

fn ec_coordinates() -> (Vec<u8>, Vec<u8>) {
    let mut r = vec![0x80];
    r.extend((1..32u8).map(|i| i.wrapping_mul(7)));
    let mut s = vec![0x7F];
    s.extend((1..32u8).map(|i| i.wrapping_mul(11)));
    (r, s)
}

fn assert_der_signature(out: &[u8], written: usize, r: &[u8], s: &[u8]) {
    assert_eq!(written, 71);
    assert_eq!(&out[..2], &[0x30, 0x45]);
    assert_eq!(&out[2..5], &[0x02, 0x21, 0x00]);
    assert_eq!(&out[5..37], r);
    assert_eq!(&out[37..39], &[0x02, 0x20]);
    assert_eq!(&out[39..71], s);
}

#[test]
fn ec_signature_is_reencoded_as_der_on_v5_3() {
    let (r, s) = ec_coordinates();
    let mut raw = r.clone();
    raw.extend_from_slice(&s);

    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]).expect(&ok(&raw));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    card.set_security_env(&SecurityEnv {
        operation: SecOperation::Sign,
        algorithm: Algorithm::Ec,
        key_ref: 0x20,
    })
    .unwrap();

    let digest = [0x22; 32];
    let mut out = [0u8; 128];
    let written = card.compute_signature(&digest, &mut out).unwrap();
    assert_der_signature(&out, written, &r, &s);
}

#[test]
fn ec_signature_discards_v5_0_coordinate_trailers() {
    let (r, s) = ec_coordinates();
    let mut raw = r.clone();
    raw.extend_from_slice(&[0x00, 0x00]);
    raw.extend_from_slice(&s);
    raw.extend_from_slice(&[0x00, 0x00]);
    assert_eq!(raw.len(), 68);

    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]).expect(&ok(&raw));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_0);

    card.set_security_env(&SecurityEnv {
        operation: SecOperation::Sign,
        algorithm: Algorithm::Ec,
        key_ref: 0x20,
    })
    .unwrap();

    let digest = [0x22; 32];
    let mut out = [0u8; 128];
    let written = card.compute_signature(&digest, &mut out).unwrap();
    assert_der_signature(&out, written, &r, &s);
}

#[test]
fn signature_requires_a_security_environment() {
    let mut card_io = ScriptedCard::new();
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    let mut out = [0u8; 64];
    assert!(matches!(
        card.compute_signature(&[0x01; 32], &mut out),
        Err(Error::InvalidArguments(_))
    ));
    drop(card);
    assert!(card_io.sent.is_empty());
}

#[test]
fn failed_environment_setup_clears_the_previous_one() {
    let mut card_io = ScriptedCard::new()
        .expect(&[0x90, 0x00]) // first MSE succeeds
        .expect(&[0x69, 0x82]); // second is refused
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let env = SecurityEnv {
        operation: SecOperation::Sign,
        algorithm: Algorithm::Rsa,
        key_ref: 0x10,
    };
    card.set_security_env(&env).unwrap();
    assert!(card.set_security_env(&env).is_err());

    let mut out = [0u8; 64];
    assert!(matches!(
        card.compute_signature(&[0x01; 32], &mut out),
        Err(Error::InvalidArguments(_))
    ));
}

#[test]
fn pin_commands_set_the_backtrack_bit() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let mut refused = PinCommand::verify(0x81, b"123456".to_vec());
    assert!(matches!(
        card.pin_cmd(&mut refused),
        Err(Error::IncorrectParameters(_))
    ));

    let mut cmd = PinCommand::verify(0x01, b"123456".to_vec());
    card.pin_cmd(&mut cmd).unwrap();
    drop(card);

    // The refused command never reached the card.
    assert_eq!(card_io.sent.len(), 1);
    assert_eq!(
        card_io.sent[0],
        [0x00, 0x20, 0x00, 0x81, 0x06, b'1', b'2', b'3', b'4', b'5', b'6']
    );
    assert_eq!(cmd.reference, 0x81);
}

#[test]
fn accumulate_object_data_returns_the_running_hash() {
    let hash = [0xC3; 16];
    let mut reply = vec![0x61, 0x07]; // two card-internal status bytes
    reply.extend_from_slice(&hash);

    let mut card_io = ScriptedCard::new().expect(&ok(&reply));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let data = [0xAA; 10];
    let got = card
        .card_ctl(CardCtl::AccumulateObjectData {
            append: false,
            data: &data,
            hash_len: hash.len(),
        })
        .unwrap();
    drop(card);

    assert_eq!(got, CardCtlReply::Hash(hash.to_vec()));
    let sent = &card_io.sent[0];
    assert_eq!(&sent[..5], &[0x80, 0xD2, 0x01, 0x00, 0x0A]);
    assert_eq!(&sent[5..15], &data);
    assert_eq!(sent[15], 0x40); // Le
}

#[test]
fn accumulate_object_data_append_uses_p1_zero() {
    let mut reply = vec![0x00, 0x00];
    reply.extend_from_slice(&[0xC3; 16]);
    let mut card_io = ScriptedCard::new().expect(&ok(&reply));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    card.card_ctl(CardCtl::AccumulateObjectData {
        append: true,
        data: &[0xAA; 4],
        hash_len: 16,
    })
    .unwrap();
    drop(card);
    assert_eq!(card_io.sent[0][2], 0x00);
}

#[test]
fn accumulate_object_data_rejects_short_replies() {
    let mut card_io = ScriptedCard::new().expect(&ok(&[0x00; 17]));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    assert_eq!(
        card.card_ctl(CardCtl::AccumulateObjectData {
            append: false,
            data: &[0xAA; 4],
            hash_len: 16,
        }),
        Err(Error::CardCmdFailed("unexpected reply length"))
    );
}

#[test]
fn generate_key_has_no_response_body() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    let params = [0x01, 0x02, 0x03];
    let reply = card.card_ctl(CardCtl::GenerateKey { data: &params }).unwrap();
    drop(card);

    assert_eq!(reply, CardCtlReply::Done);
    assert_eq!(
        card_io.sent[0],
        [0x00, 0x46, 0x80, 0x00, 0x03, 0x01, 0x02, 0x03]
    );
}

#[test]
fn extract_key_returns_an_owned_copy() {
    let key = vec![0x42; 300];
    let mut card_io = ScriptedCard::new().expect(&ok(&key));
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    let params = [0x09];
    let reply = card.card_ctl(CardCtl::ExtractKey { data: &params }).unwrap();
    drop(card);

    let CardCtlReply::Key(extracted) = reply else {
        panic!("expected key material");
    };
    assert_eq!(extracted.as_ref(), key.as_slice());

    // Extended case 4: 00-prefixed Lc, data, two-byte Le of 768.
    let sent = &card_io.sent[0];
    assert_eq!(&sent[..4], &[0x00, 0x46, 0x86, 0x00]);
    assert_eq!(&sent[4..7], &[0x00, 0x00, 0x01]);
    assert_eq!(sent[7], 0x09);
    assert_eq!(&sent[8..], &[0x03, 0x00]);
}

#[test]
fn init_card_is_a_bare_header() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    card.card_ctl(CardCtl::InitCard).unwrap();
    drop(card);
    assert_eq!(card_io.sent[0], [0x80, 0x9C, 0x03, 0x00]);
}

#[test]
fn put_data_variants_use_their_parameter_bytes() {
    let mut card_io = ScriptedCard::new()
        .expect(&[0x90, 0x00])
        .expect(&[0x90, 0x00])
        .expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    card.card_ctl(CardCtl::PutDataEcd { data: &[0x01] }).unwrap();
    card.card_ctl(CardCtl::PutDataOci { data: &[0x02] }).unwrap();
    card.card_ctl(CardCtl::PutDataSeci { data: &[0x03] }).unwrap();
    drop(card);

    assert_eq!(&card_io.sent[0][..4], &[0x00, 0xDA, 0x01, 0x6C]);
    assert_eq!(&card_io.sent[1][..4], &[0x00, 0xDA, 0x01, 0x6E]);
    assert_eq!(&card_io.sent[2][..4], &[0x00, 0xDA, 0x01, 0x6D]);
}

#[test]
fn lifecycle_round_trip() {
    let mut card_io = ScriptedCard::new()
        .expect(&ok(&[0x10])) // get: operational
        .expect(&ok(&[0x10])) // set reads first
        .expect(&[0x90, 0x00]); // then toggles
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    assert_eq!(
        card.card_ctl(CardCtl::LifecycleGet).unwrap(),
        CardCtlReply::Lifecycle(Lifecycle::User)
    );
    card.card_ctl(CardCtl::LifecycleSet {
        target: Lifecycle::Admin,
    })
    .unwrap();
    drop(card);

    assert_eq!(card_io.sent[0], [0x00, 0xCA, 0x01, 0x83, 0x01]);
    assert_eq!(card_io.sent[2], [0x80, 0x10, 0x00, 0x00]);
}

#[test]
fn logout_reselects_the_mf() {
    let mut card_io = ScriptedCard::new().expect(&[0x90, 0x00]);
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);
    card.logout().unwrap();
    drop(card);
    assert_eq!(card_io.sent[0], [0x00, 0xA4, 0x00, 0x0C, 0x02, 0x3F, 0x00]);
}

#[test]
fn unsupported_operations() {
    let mut card_io = ScriptedCard::new();
    let mut card = Cardos5::new(&mut card_io, CardType::V5_3);

    assert_eq!(card.list_files(), Err(Error::NotSupported));
    assert_eq!(card.restore_security_env(1), Err(Error::NotSupported));
    let mut out = [0u8; 16];
    assert_eq!(card.get_data(0x0101, &mut out), Err(Error::NotSupported));
}

#[test]
fn driver_matches_only_the_closed_atr_table() {
    let v5_0 = hex::decode("3bd218008131fe58c90114").unwrap();
    let v5_3 = hex::decode("3bd218008131fe58c90316").unwrap();

    assert_eq!(
        Cardos5::<ScriptedCard>::match_card(&v5_0),
        Some(CardType::V5_0)
    );
    assert_eq!(
        Cardos5::<ScriptedCard>::match_card(&v5_3),
        Some(CardType::V5_3)
    );
    assert_eq!(Cardos5::<ScriptedCard>::match_card(&[0x3B, 0x00]), None);

    let card = Cardos5::from_atr(ScriptedCard::new(), &v5_0).unwrap();
    assert_eq!(card.card_type(), CardType::V5_0);
    assert!(matches!(
        Cardos5::from_atr(ScriptedCard::new(), &[0x3B]),
        Err(Error::InvalidArguments(_))
    ));
}
