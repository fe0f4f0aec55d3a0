use super::*;
use crate::identity::Identity;

struct Side {
    id: PeerId,
    manager: SessionManager,
}

fn side(name: &str) -> Side {
    let identity = Identity::generate(name);
    Side {
        id: identity.peer_id(),
        manager: SessionManager::new(identity.peer_id(), identity.static_secret().clone()),
    }
}

/// Run the three-message handshake from `a` to `b`.
fn establish(a: &mut Side, b: &mut Side) {
    let msg1 = a.manager.initiate_handshake(b.id).unwrap().unwrap();
    let msg2 = b
        .manager
        .process_handshake_message(a.id, &msg1)
        .unwrap()
        .unwrap();
    let msg3 = a
        .manager
        .process_handshake_message(b.id, &msg2)
        .unwrap()
        .unwrap();
    assert!(b
        .manager
        .process_handshake_message(a.id, &msg3)
        .unwrap()
        .is_none());
}

#[test]
fn test_state_transitions() {
    let mut alice = side("alice");
    let mut bob = side("bob");

    assert_eq!(alice.manager.state(&bob.id), SessionState::None);

    let msg1 = alice.manager.initiate_handshake(bob.id).unwrap().unwrap();
    assert_eq!(msg1.len(), 32);
    assert_eq!(alice.manager.state(&bob.id), SessionState::Initiated);

    let msg2 = bob
        .manager
        .process_handshake_message(alice.id, &msg1)
        .unwrap()
        .unwrap();
    assert_eq!(msg2.len(), 96);
    assert_eq!(bob.manager.state(&alice.id), SessionState::Responded);

    let msg3 = alice
        .manager
        .process_handshake_message(bob.id, &msg2)
        .unwrap()
        .unwrap();
    assert_eq!(msg3.len(), 64);
    assert!(alice.manager.has_established_session(&bob.id));
    assert_eq!(
        alice.manager.take_events(),
        vec![SessionEvent::Established(bob.id)]
    );
    assert!(alice.manager.take_events().is_empty());

    let reply = bob
        .manager
        .process_handshake_message(alice.id, &msg3)
        .unwrap();
    assert!(reply.is_none());
    assert!(bob.manager.has_established_session(&alice.id));
    assert_eq!(
        bob.manager.take_events(),
        vec![SessionEvent::Established(alice.id)]
    );
}

#[test]
fn test_initiate_is_idempotent() {
    let mut alice = side("alice");
    let bob = side("bob");

    assert!(alice.manager.initiate_handshake(bob.id).unwrap().is_some());
    assert!(alice.manager.initiate_handshake(bob.id).unwrap().is_none());
    assert!(alice.manager.initiate_handshake(bob.id).unwrap().is_none());
    assert_eq!(alice.manager.len(), 1);
    assert_eq!(alice.manager.state(&bob.id), SessionState::Initiated);
}

#[test]
fn test_abandon_unfinished_handshake() {
    let mut alice = side("alice");
    let mut bob = side("bob");

    alice.manager.initiate_handshake(bob.id).unwrap().unwrap();
    assert!(alice.manager.abandon(&bob.id));
    assert_eq!(alice.manager.state(&bob.id), SessionState::None);
    assert!(!alice.manager.abandon(&bob.id));

    // Starting over produces a fresh message 1
    assert!(alice.manager.initiate_handshake(bob.id).unwrap().is_some());
    alice.manager.abandon(&bob.id);

    establish(&mut alice, &mut bob);
    assert!(!alice.manager.abandon(&bob.id));
    assert!(alice.manager.has_established_session(&bob.id));
}

#[test]
fn test_encrypt_decrypt_after_establish() {
    let mut alice = side("alice");
    let mut bob = side("bob");
    establish(&mut alice, &mut bob);

    let ct = alice.manager.encrypt(b"secret", &bob.id).unwrap();
    assert_eq!(bob.manager.decrypt(&ct, &alice.id).unwrap(), b"secret");

    let ct = bob.manager.encrypt(b"reply", &alice.id).unwrap();
    assert_eq!(alice.manager.decrypt(&ct, &bob.id).unwrap(), b"reply");
}

#[test]
fn test_encrypt_requires_handshake() {
    let mut alice = side("alice");
    let bob = side("bob");

    assert!(matches!(
        alice.manager.encrypt(b"x", &bob.id),
        Err(SessionError::HandshakeRequired(p)) if p == bob.id
    ));

    // Initiated is not enough, and encrypt never starts a handshake itself.
    alice.manager.initiate_handshake(bob.id).unwrap();
    assert!(matches!(
        alice.manager.encrypt(b"x", &bob.id),
        Err(SessionError::HandshakeRequired(_))
    ));
    assert_eq!(alice.manager.len(), 1);
}

#[test]
fn test_decrypt_without_session() {
    let mut alice = side("alice");
    let bob = side("bob");
    assert!(matches!(
        alice.manager.decrypt(&[0u8; 40], &bob.id),
        Err(SessionError::SessionNotEstablished(_))
    ));
}

#[test]
fn test_established_is_terminal() {
    let mut alice = side("alice");
    let mut bob = side("bob");
    establish(&mut alice, &mut bob);
    bob.manager.take_events();

    // A fresh message 1 from a third handshake attempt is ignored.
    let mut carol_like = HandshakeState::new_initiator(StaticSecret::from([9u8; 32]));
    let msg1 = carol_like.write_message_1().unwrap();
    let reply = bob.manager.process_handshake_message(alice.id, &msg1).unwrap();
    assert!(reply.is_none());
    assert!(bob.manager.has_established_session(&alice.id));
    assert!(bob.manager.take_events().is_empty());

    // The original session still works.
    let ct = alice.manager.encrypt(b"still here", &bob.id).unwrap();
    assert_eq!(bob.manager.decrypt(&ct, &alice.id).unwrap(), b"still here");
}

#[test]
fn test_simultaneous_initiation_tie_break() {
    let mut alice = side("alice");
    let mut bob = side("bob");
    let (low, high) = if alice.id < bob.id {
        (&mut alice, &mut bob)
    } else {
        (&mut bob, &mut alice)
    };

    let low_msg1 = low.manager.initiate_handshake(high.id).unwrap().unwrap();
    let high_msg1 = high.manager.initiate_handshake(low.id).unwrap().unwrap();

    // Smaller id ignores the other's message 1 and stays initiator.
    assert!(low
        .manager
        .process_handshake_message(high.id, &high_msg1)
        .unwrap()
        .is_none());
    assert_eq!(low.manager.state(&high.id), SessionState::Initiated);

    // Larger id abandons its own attempt and responds.
    let msg2 = high
        .manager
        .process_handshake_message(low.id, &low_msg1)
        .unwrap()
        .unwrap();
    assert_eq!(high.manager.state(&low.id), SessionState::Responded);

    let msg3 = low
        .manager
        .process_handshake_message(high.id, &msg2)
        .unwrap()
        .unwrap();
    high.manager
        .process_handshake_message(low.id, &msg3)
        .unwrap();

    assert!(low.manager.has_established_session(&high.id));
    assert!(high.manager.has_established_session(&low.id));
}

#[test]
fn test_identity_mismatch_discards_session() {
    let mut alice = side("alice");
    let mut bob = side("bob");
    let impostor_id = PeerId::from_bytes([0xEE; 8]);

    // Alice thinks she is talking to `impostor_id`, but bob answers.
    let msg1 = alice.manager.initiate_handshake(impostor_id).unwrap().unwrap();
    let msg2 = bob
        .manager
        .process_handshake_message(alice.id, &msg1)
        .unwrap()
        .unwrap();

    let result = alice.manager.process_handshake_message(impostor_id, &msg2);
    match result {
        Err(SessionError::IdentityMismatch { expected, derived }) => {
            assert_eq!(expected, impostor_id);
            assert_eq!(derived, bob.id);
        }
        other => panic!("expected identity mismatch, got {:?}", other),
    }
    assert_eq!(alice.manager.state(&impostor_id), SessionState::None);
    assert!(alice.manager.take_events().is_empty());

    // A later attempt can start over.
    assert!(alice.manager.initiate_handshake(impostor_id).unwrap().is_some());
}

#[test]
fn test_failed_step_discards_session() {
    let mut alice = side("alice");
    let bob = side("bob");

    alice.manager.initiate_handshake(bob.id).unwrap();
    let garbage = [0x42u8; 96];
    assert!(alice
        .manager
        .process_handshake_message(bob.id, &garbage)
        .is_err());
    assert_eq!(alice.manager.state(&bob.id), SessionState::None);
}

#[test]
fn test_unexpected_message_without_session() {
    let mut bob = side("bob");
    let alice_id = PeerId::from_bytes([1; 8]);
    assert!(matches!(
        bob.manager.process_handshake_message(alice_id, &[0u8; 64]),
        Err(SessionError::UnexpectedMessage {
            state: SessionState::None,
            len: 64,
            ..
        })
    ));
    assert!(bob.manager.is_empty());
}

#[test]
fn test_remote_static_and_established_peers() {
    let mut alice = side("alice");
    let mut bob = side("bob");
    assert!(alice.manager.remote_static(&bob.id).is_none());
    establish(&mut alice, &mut bob);

    let rs = alice.manager.remote_static(&bob.id).unwrap();
    assert_eq!(PeerId::derive(&rs), bob.id);
    assert_eq!(alice.manager.established_peers(), vec![bob.id]);
}
