use super::*;
use crate::identity::PeerId;

fn sample_announce() -> AnnouncementPacket {
    AnnouncementPacket::new("alice", [1u8; 32], [2u8; 32])
}

#[test]
fn test_announce_layout() {
    let bytes = sample_announce().encode().unwrap();
    assert_eq!(&bytes[..7], &[0x01, 5, b'a', b'l', b'i', b'c', b'e']);
    assert_eq!(&bytes[7..9], &[0x02, 32]);
    assert_eq!(&bytes[41..43], &[0x03, 32]);
    assert_eq!(bytes.len(), 7 + 34 + 34);
}

#[test]
fn test_announce_with_neighbors() {
    let neighbors: Vec<PeerId> = (0..12u8).map(|i| PeerId::from_bytes([i; 8])).collect();
    let announce = sample_announce().with_neighbors(neighbors.clone());
    assert_eq!(announce.direct_neighbors.len(), MAX_NEIGHBORS);

    let decoded = AnnouncementPacket::decode(&announce.encode().unwrap()).unwrap();
    assert_eq!(decoded.direct_neighbors.as_slice(), &neighbors[..MAX_NEIGHBORS]);
    assert_eq!(decoded, announce);
}

#[test]
fn test_announce_skips_unknown_tlv() {
    let mut bytes = vec![0x7E, 3, 9, 9, 9];
    bytes.extend(sample_announce().encode().unwrap());
    bytes.extend([0x7F, 0]);
    assert_eq!(AnnouncementPacket::decode(&bytes).unwrap(), sample_announce());
}

#[test]
fn test_announce_missing_key() {
    let bytes = [0x01, 1, b'x'];
    assert_eq!(
        AnnouncementPacket::decode(&bytes),
        Err(ProtocolError::MissingField(0x02))
    );
}

#[test]
fn test_announce_bad_key_length() {
    let mut bytes = vec![0x01, 1, b'x', 0x02, 3, 1, 2, 3];
    bytes.extend([0x03, 32]);
    bytes.extend([0u8; 32]);
    assert!(matches!(
        AnnouncementPacket::decode(&bytes),
        Err(ProtocolError::InvalidFieldLength { field: 0x02, .. })
    ));
}

#[test]
fn test_announce_truncated_tlv() {
    let mut bytes = sample_announce().encode().unwrap();
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(
        AnnouncementPacket::decode(&bytes),
        Err(ProtocolError::MessageTooShort { .. })
    ));
}

#[test]
fn test_announce_derived_peer_id() {
    let announce = AnnouncementPacket::new("z", [0u8; 32], [0u8; 32]);
    assert_eq!(announce.derived_peer_id().to_hex(), "66687aadf862bd77");
}

#[test]
fn test_private_message_layout() {
    let pm = PrivateMessage::new("id1", "hi");
    let bytes = pm.encode().unwrap();
    assert_eq!(bytes, vec![0x00, 3, b'i', b'd', b'1', 0x01, 2, b'h', b'i']);
    assert_eq!(PrivateMessage::decode(&bytes).unwrap(), pm);
}

#[test]
fn test_private_message_content_limit() {
    let ok = PrivateMessage::new("id", "a".repeat(MAX_VALUE_LEN));
    assert!(ok.encode().is_ok());

    let too_long = PrivateMessage::new("id", "a".repeat(MAX_VALUE_LEN + 1));
    assert_eq!(
        too_long.encode(),
        Err(ProtocolError::FieldTooLong {
            field: 0x01,
            max: 255,
            got: 256
        })
    );
}

#[test]
fn test_encrypted_payload_tag() {
    let payload = EncryptedPayload::PrivateMessage(PrivateMessage::new("m", "body"));
    let bytes = payload.encode().unwrap();
    assert_eq!(bytes[0], 0x01);
    assert_eq!(EncryptedPayload::decode(&bytes).unwrap(), payload);

    assert_eq!(EncryptedPayload::decode(&[]), Err(ProtocolError::Empty));
    assert_eq!(
        EncryptedPayload::decode(&[0x09, 0]),
        Err(ProtocolError::UnknownPayloadType(0x09))
    );
}
