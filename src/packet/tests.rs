use super::*;

fn sender() -> PeerId {
    PeerId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8])
}

fn scenario_packet() -> Packet {
    Packet::new(
        PacketType::Message,
        sender(),
        None,
        1_700_000_000_000,
        b"hello".to_vec(),
        DEFAULT_TTL,
    )
}

#[test]
fn test_scenario_packet_roundtrip() {
    let packet = scenario_packet();
    let bytes = packet.encode(false).unwrap();
    assert_eq!(bytes.len(), MIN_FRAME_SIZE + 5);

    // Header layout
    assert_eq!(bytes[0], 1);
    assert_eq!(bytes[1], 0x02);
    assert_eq!(bytes[2], 7);
    assert_eq!(&bytes[3..11], &1_700_000_000_000u64.to_be_bytes());
    assert_eq!(bytes[11], 0);
    assert_eq!(&bytes[12..14], &[0, 5]);
    assert_eq!(&bytes[14..22], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&bytes[22..], b"hello");

    let decoded = Packet::decode(&bytes).unwrap();
    assert_eq!(decoded, packet);
    assert_eq!(decoded.kind(), Some(PacketType::Message));
    assert!(decoded.is_broadcast());
}

#[test]
fn test_padded_frame_decodes_to_same_packet() {
    let packet = scenario_packet();
    let padded = packet.encode(true).unwrap();
    assert_eq!(padded.len(), 256);
    assert_eq!(Packet::decode(&padded).unwrap(), packet);
}

#[test]
fn test_recipient_route_and_signature_roundtrip() {
    let mut packet = Packet::new(
        PacketType::NoiseEncrypted,
        sender(),
        Some(PeerId::from_bytes([9; 8])),
        42,
        vec![0xEE; 40],
        3,
    );
    packet.route = Some(vec![
        PeerId::from_bytes([0xA; 8]),
        PeerId::from_bytes([0xB; 8]),
    ]);
    packet.signature = Some([0x55; SIGNATURE_SIZE]);

    let bytes = packet.encode(false).unwrap();
    assert_eq!(bytes.len(), packet.encoded_len());
    assert_eq!(
        bytes[11],
        FLAG_HAS_RECIPIENT | FLAG_HAS_SIGNATURE | FLAG_HAS_ROUTE
    );
    assert_eq!(&bytes[22..30], &[9; 8]);
    assert_eq!(bytes[30], 2);

    let decoded = Packet::decode(&bytes).unwrap();
    assert_eq!(decoded, packet);
    assert!(!decoded.is_broadcast());
}

#[test]
fn test_reencode_is_byte_identical() {
    let mut packet = scenario_packet();
    packet.signature = Some([7; SIGNATURE_SIZE]);
    let bytes = packet.encode(false).unwrap();
    let again = Packet::decode(&bytes).unwrap().encode(false).unwrap();
    assert_eq!(bytes, again);
}

#[test]
fn test_signing_bytes_ignore_ttl_and_signature() {
    let base = scenario_packet();
    let mut relayed = base.clone();
    relayed.ttl = 2;
    relayed.signature = Some([0xAA; SIGNATURE_SIZE]);

    let a = base.signing_bytes().unwrap();
    let b = relayed.signing_bytes().unwrap();
    assert_eq!(a, b);
    assert_eq!(a[2], 0);
    assert_eq!(a.len(), base.encoded_len());

    let mut changed = base.clone();
    changed.payload = b"hellO".to_vec();
    assert_ne!(changed.signing_bytes().unwrap(), a);
}

#[test]
fn test_decode_rejects_short_frame() {
    let bytes = scenario_packet().encode(false).unwrap();
    assert_eq!(
        Packet::decode(&bytes[..MIN_FRAME_SIZE - 1]),
        Err(PacketError::TooShort {
            expected: MIN_FRAME_SIZE,
            got: MIN_FRAME_SIZE - 1
        })
    );
    // Header claims 5 payload bytes, only 2 present.
    assert!(matches!(
        Packet::decode(&bytes[..MIN_FRAME_SIZE + 2]),
        Err(PacketError::TooShort { .. })
    ));
}

#[test]
fn test_decode_rejects_unsupported_version() {
    let mut bytes = scenario_packet().encode(false).unwrap();
    bytes[0] = 2;
    assert_eq!(
        Packet::decode(&bytes),
        Err(PacketError::UnsupportedVersion(2))
    );
}

#[test]
fn test_decode_rejects_compressed_flag() {
    let mut bytes = scenario_packet().encode(false).unwrap();
    bytes[11] |= FLAG_IS_COMPRESSED;
    assert_eq!(
        Packet::decode(&bytes),
        Err(PacketError::UnsupportedFlags(FLAG_IS_COMPRESSED))
    );
}

#[test]
fn test_decode_rejects_trailing_garbage() {
    let mut bytes = scenario_packet().encode(false).unwrap();
    bytes.extend_from_slice(&[1, 2, 3]);
    assert_eq!(Packet::decode(&bytes), Err(PacketError::TrailingBytes(3)));
}

#[test]
fn test_unknown_type_still_decodes() {
    let mut packet = scenario_packet();
    packet.packet_type = 0x7F;
    let decoded = Packet::decode(&packet.encode(false).unwrap()).unwrap();
    assert_eq!(decoded.packet_type, 0x7F);
    assert_eq!(decoded.kind(), None);
}

#[test]
fn test_encode_rejects_oversized_payload() {
    let mut packet = scenario_packet();
    packet.payload = vec![0; MAX_PAYLOAD_SIZE + 1];
    assert!(matches!(
        packet.encode(false),
        Err(PacketError::PayloadTooLarge { .. })
    ));
}

#[test]
fn test_packet_type_codes() {
    for t in [
        PacketType::Announce,
        PacketType::Message,
        PacketType::Leave,
        PacketType::NoiseHandshake,
        PacketType::NoiseEncrypted,
        PacketType::Fragment,
    ] {
        assert_eq!(PacketType::from_byte(t.to_byte()), Some(t));
    }
    assert_eq!(PacketType::from_byte(0x04), None);
    assert_eq!(PacketType::NoiseHandshake.to_string(), "noise_handshake");
}
