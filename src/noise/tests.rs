use super::*;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

fn generate_secret() -> StaticSecret {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    StaticSecret::from(bytes)
}

fn public_of(secret: &StaticSecret) -> [u8; 32] {
    PublicKey::from(secret).to_bytes()
}

/// Run a full XX handshake and return (initiator, responder) sessions.
fn handshake_pair(
    initiator_secret: StaticSecret,
    responder_secret: StaticSecret,
) -> (NoiseSession, NoiseSession) {
    let mut initiator = HandshakeState::new_initiator(initiator_secret);
    let mut responder = HandshakeState::new_responder(responder_secret);

    let msg1 = initiator.write_message_1().unwrap();
    responder.read_message_1(&msg1).unwrap();
    let msg2 = responder.write_message_2().unwrap();
    initiator.read_message_2(&msg2).unwrap();
    let msg3 = initiator.write_message_3().unwrap();
    responder.read_message_3(&msg3).unwrap();

    (
        initiator.into_session().unwrap(),
        responder.into_session().unwrap(),
    )
}

#[test]
fn test_full_handshake() {
    let initiator_secret = generate_secret();
    let responder_secret = generate_secret();
    let initiator_pub = public_of(&initiator_secret);
    let responder_pub = public_of(&responder_secret);

    let mut initiator = HandshakeState::new_initiator(initiator_secret);
    let mut responder = HandshakeState::new_responder(responder_secret);

    assert_eq!(initiator.role(), HandshakeRole::Initiator);
    assert_eq!(responder.role(), HandshakeRole::Responder);

    // Message 1: Initiator -> Responder
    let msg1 = initiator.write_message_1().unwrap();
    assert_eq!(msg1.len(), HANDSHAKE_MSG1_SIZE);
    responder.read_message_1(&msg1).unwrap();

    // Nobody knows anybody yet
    assert!(responder.remote_static().is_none());
    assert!(initiator.remote_static().is_none());

    // Message 2: Responder -> Initiator
    let msg2 = responder.write_message_2().unwrap();
    assert_eq!(msg2.len(), HANDSHAKE_MSG2_SIZE);
    initiator.read_message_2(&msg2).unwrap();

    // Initiator learned the responder's identity
    assert_eq!(initiator.remote_static(), Some(&responder_pub));
    assert!(!initiator.is_complete());

    // Message 3: Initiator -> Responder
    let msg3 = initiator.write_message_3().unwrap();
    assert_eq!(msg3.len(), HANDSHAKE_MSG3_SIZE);
    responder.read_message_3(&msg3).unwrap();

    assert_eq!(responder.remote_static(), Some(&initiator_pub));
    assert!(initiator.is_complete());
    assert!(responder.is_complete());
    assert_eq!(initiator.handshake_hash(), responder.handshake_hash());

    let mut initiator_session = initiator.into_session().unwrap();
    let mut responder_session = responder.into_session().unwrap();
    assert_eq!(initiator_session.remote_static(), &responder_pub);
    assert_eq!(responder_session.remote_static(), &initiator_pub);

    let ciphertext = initiator_session.encrypt(b"Hello, secure world!").unwrap();
    assert_eq!(
        ciphertext.len(),
        COUNTER_SIZE + b"Hello, secure world!".len() + TAG_SIZE
    );
    assert_eq!(
        responder_session.decrypt(&ciphertext).unwrap(),
        b"Hello, secure world!"
    );

    let ciphertext2 = responder_session.encrypt(b"Hello back!").unwrap();
    assert_eq!(
        initiator_session.decrypt(&ciphertext2).unwrap(),
        b"Hello back!"
    );
}

#[test]
fn test_message_sizes() {
    assert_eq!(HANDSHAKE_MSG1_SIZE, 32);
    assert_eq!(HANDSHAKE_MSG2_SIZE, 96);
    assert_eq!(HANDSHAKE_MSG3_SIZE, 64);
    assert_eq!(PROTOCOL_NAME.len(), 32);
}

#[test]
fn test_counter_prefix_increments() {
    let (mut a, mut b) = handshake_pair(generate_secret(), generate_secret());
    for i in 0..5u64 {
        let ct = a.encrypt(b"x").unwrap();
        assert_eq!(&ct[..COUNTER_SIZE], &i.to_be_bytes());
        assert_eq!(b.decrypt(&ct).unwrap(), b"x");
    }
    assert_eq!(a.send_nonce(), 5);
}

#[test]
fn test_out_of_order_delivery() {
    let (mut a, mut b) = handshake_pair(generate_secret(), generate_secret());
    let first = a.encrypt(b"first").unwrap();
    let second = a.encrypt(b"second").unwrap();
    let third = a.encrypt(b"third").unwrap();

    assert_eq!(b.decrypt(&third).unwrap(), b"third");
    assert_eq!(b.decrypt(&first).unwrap(), b"first");
    assert_eq!(b.decrypt(&second).unwrap(), b"second");
}

#[test]
fn test_replay_rejected() {
    let (mut a, mut b) = handshake_pair(generate_secret(), generate_secret());
    let ct = a.encrypt(b"once").unwrap();
    assert!(b.decrypt(&ct).is_ok());
    assert_eq!(b.decrypt(&ct), Err(NoiseError::ReplayDetected(0)));
}

#[test]
fn test_tampered_ciphertext_does_not_burn_counter() {
    let (mut a, mut b) = handshake_pair(generate_secret(), generate_secret());
    let ct = a.encrypt(b"payload").unwrap();
    let mut forged = ct.clone();
    let last = forged.len() - 1;
    forged[last] ^= 0xFF;

    assert_eq!(b.decrypt(&forged), Err(NoiseError::DecryptionFailed));
    assert_eq!(b.decrypt(&ct).unwrap(), b"payload");
}

#[test]
fn test_decryption_failure_wrong_session() {
    let shared = generate_secret();
    let shared_bytes = shared.to_bytes();
    let (mut session1, _) = handshake_pair(shared, generate_secret());
    let (_, mut session2) = handshake_pair(StaticSecret::from(shared_bytes), generate_secret());

    let ciphertext = session1.encrypt(b"test").unwrap();
    assert_eq!(session2.decrypt(&ciphertext), Err(NoiseError::DecryptionFailed));
}

#[test]
fn test_wrong_role_errors() {
    let mut initiator = HandshakeState::new_initiator(generate_secret());
    assert!(matches!(
        initiator.read_message_1(&[0u8; HANDSHAKE_MSG1_SIZE]),
        Err(NoiseError::WrongState { .. })
    ));
    assert!(initiator.write_message_2().is_err());
    assert!(initiator.write_message_3().is_err());

    let mut responder = HandshakeState::new_responder(generate_secret());
    assert!(responder.write_message_1().is_err());
}

#[test]
fn test_wrong_length_rejected() {
    let mut responder = HandshakeState::new_responder(generate_secret());
    assert_eq!(
        responder.read_message_1(&[1u8; 31]),
        Err(NoiseError::InvalidLength {
            expected: HANDSHAKE_MSG1_SIZE,
            got: 31
        })
    );
}

#[test]
fn test_low_order_ephemeral_rejected() {
    let mut responder = HandshakeState::new_responder(generate_secret());
    responder.read_message_1(&[0u8; HANDSHAKE_MSG1_SIZE]).unwrap();
    assert_eq!(
        responder.write_message_2(),
        Err(NoiseError::InvalidPublicKey)
    );
}

#[test]
fn test_tampered_message_2_fails() {
    let mut initiator = HandshakeState::new_initiator(generate_secret());
    let mut responder = HandshakeState::new_responder(generate_secret());

    let msg1 = initiator.write_message_1().unwrap();
    responder.read_message_1(&msg1).unwrap();
    let mut msg2 = responder.write_message_2().unwrap();
    msg2[40] ^= 0x01;

    assert_eq!(
        initiator.read_message_2(&msg2),
        Err(NoiseError::DecryptionFailed)
    );
}

#[test]
fn test_into_session_before_complete() {
    let mut initiator = HandshakeState::new_initiator(generate_secret());
    initiator.write_message_1().unwrap();
    assert!(matches!(
        initiator.into_session(),
        Err(NoiseError::HandshakeNotComplete)
    ));
}

#[test]
fn test_cipher_state_nonce_sequence() {
    let mut cipher = CipherState::new([0u8; 32]);
    assert_eq!(cipher.nonce(), 0);
    let _ = cipher.encrypt(b"test").unwrap();
    assert_eq!(cipher.nonce(), 1);
    let _ = cipher.encrypt(b"test").unwrap();
    assert_eq!(cipher.nonce(), 2);
}

#[test]
fn test_cipher_state_without_key_passes_through() {
    let mut cipher = CipherState::empty();
    assert!(!cipher.has_key());
    assert_eq!(cipher.encrypt(b"clear").unwrap(), b"clear");
}

#[test]
fn test_replay_window_basic() {
    let mut window = ReplayWindow::new();
    assert!(window.check(0));
    window.accept(0);
    assert!(!window.check(0));
    assert!(window.check(1));
    window.accept(5);
    assert!(window.check(3));
    assert!(!window.check(5));
    assert_eq!(window.highest(), Some(5));
}

#[test]
fn test_replay_window_too_old() {
    let mut window = ReplayWindow::new();
    window.accept(0);
    window.accept(REPLAY_WINDOW_SIZE as u64 + 10);
    assert!(!window.check(5));
    assert!(window.check(REPLAY_WINDOW_SIZE as u64 + 9));
    assert!(window.check(11));
}

#[test]
fn test_replay_window_slot_reuse() {
    let mut window = ReplayWindow::new();
    window.accept(3);
    // Advancing by exactly one window reuses the slot of counter 3.
    window.accept(3 + REPLAY_WINDOW_SIZE as u64 - 1);
    window.accept(3 + REPLAY_WINDOW_SIZE as u64);
    assert!(!window.check(3 + REPLAY_WINDOW_SIZE as u64));
    assert!(window.check(4 + REPLAY_WINDOW_SIZE as u64));
    assert!(!window.check(3));
}
