use super::{
    CipherState, HandshakeProgress, HandshakeRole, NoiseError, NoiseSession, HANDSHAKE_MSG1_SIZE,
    HANDSHAKE_MSG2_SIZE, HANDSHAKE_MSG3_SIZE, PROTOCOL_NAME, PUBKEY_SIZE, TAG_SIZE,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Size of an encrypted static key inside a handshake message.
const ENCRYPTED_STATIC_SIZE: usize = PUBKEY_SIZE + TAG_SIZE;

/// Chaining key, transcript hash and handshake cipher.
struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cipher: CipherState,
}

impl SymmetricState {
    fn initialize() -> Self {
        // The protocol name is exactly HASHLEN bytes and is used as h directly
        let mut h = [0u8; 32];
        h.copy_from_slice(PROTOCOL_NAME);
        Self {
            ck: h,
            h,
            cipher: CipherState::empty(),
        }
    }

    fn mix_hash(&mut self, data: &[u8]) {
        self.h = Sha256::new().chain_update(self.h).chain_update(data).finalize().into();
    }

    fn mix_key(&mut self, input_key_material: &[u8]) -> Result<(), NoiseError> {
        let (ck, key) = hkdf2(&self.ck, input_key_material)?;
        self.ck = ck;
        self.cipher.initialize_key(key);
        Ok(())
    }

    /// Encrypt with h as associated data, then absorb the ciphertext.
    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let ad = self.h;
        let ciphertext = self.cipher.encrypt_with_ad(plaintext, &ad)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let ad = self.h;
        let plaintext = self.cipher.decrypt_with_ad(ciphertext, &ad)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    fn handshake_hash(&self) -> [u8; 32] {
        self.h
    }

    /// Derive the two transport ciphers, initiator-to-responder first.
    fn split(&self) -> Result<(CipherState, CipherState), NoiseError> {
        let (k1, k2) = hkdf2(&self.ck, &[])?;
        Ok((CipherState::new(k1), CipherState::new(k2)))
    }
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
    }
}

/// Noise HKDF with two outputs, keyed by the chaining key.
fn hkdf2(ck: &[u8; 32], ikm: &[u8]) -> Result<([u8; 32], [u8; 32]), NoiseError> {
    let hk = Hkdf::<Sha256>::new(Some(ck), ikm);
    let mut output = [0u8; 64];
    hk.expand(&[], &mut output)
        .map_err(|_| NoiseError::KeyDerivation)?;

    let mut k1 = [0u8; 32];
    let mut k2 = [0u8; 32];
    k1.copy_from_slice(&output[..32]);
    k2.copy_from_slice(&output[32..]);
    output.zeroize();
    Ok((k1, k2))
}

/// One side of a Noise XX handshake.
///
/// Messages must be written and read in pattern order; anything else fails
/// with `WrongState`. The remote static key is learned from message 2
/// (initiator) or message 3 (responder).
pub struct HandshakeState {
    role: HandshakeRole,
    progress: HandshakeProgress,
    symmetric: SymmetricState,
    static_secret: StaticSecret,
    // Used for two DH operations, hence StaticSecret
    ephemeral: Option<StaticSecret>,
    remote_static: Option<[u8; PUBKEY_SIZE]>,
    remote_ephemeral: Option<[u8; PUBKEY_SIZE]>,
}

impl HandshakeState {
    fn new(role: HandshakeRole, static_secret: StaticSecret) -> Self {
        let mut symmetric = SymmetricState::initialize();
        // Empty prologue
        symmetric.mix_hash(&[]);
        Self {
            role,
            progress: HandshakeProgress::Initial,
            symmetric,
            static_secret,
            ephemeral: None,
            remote_static: None,
            remote_ephemeral: None,
        }
    }

    /// Create a new handshake as initiator.
    pub fn new_initiator(static_secret: StaticSecret) -> Self {
        Self::new(HandshakeRole::Initiator, static_secret)
    }

    /// Create a new handshake as responder.
    pub fn new_responder(static_secret: StaticSecret) -> Self {
        Self::new(HandshakeRole::Responder, static_secret)
    }

    pub fn role(&self) -> HandshakeRole {
        self.role
    }

    pub fn progress(&self) -> HandshakeProgress {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress == HandshakeProgress::Complete
    }

    /// Remote static key (initiator: after message 2, responder: after message 3).
    pub fn remote_static(&self) -> Option<&[u8; PUBKEY_SIZE]> {
        self.remote_static.as_ref()
    }

    fn expect_state(
        &self,
        role: HandshakeRole,
        progress: HandshakeProgress,
    ) -> Result<(), NoiseError> {
        if self.role != role {
            return Err(NoiseError::WrongState {
                expected: role.to_string(),
                got: self.role.to_string(),
            });
        }
        if self.progress != progress {
            return Err(NoiseError::WrongState {
                expected: progress.to_string(),
                got: self.progress.to_string(),
            });
        }
        Ok(())
    }

    /// Generate an ephemeral secret and return its public key.
    fn generate_ephemeral(&mut self) -> [u8; PUBKEY_SIZE] {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        let secret = StaticSecret::from(secret_bytes);
        secret_bytes.zeroize();
        let public = PublicKey::from(&secret).to_bytes();
        self.ephemeral = Some(secret);
        public
    }

    fn ephemeral(&self) -> Result<&StaticSecret, NoiseError> {
        self.ephemeral
            .as_ref()
            .ok_or_else(|| NoiseError::WrongState {
                expected: "ephemeral generated".to_string(),
                got: self.progress.to_string(),
            })
    }

    fn remote_ephemeral(&self) -> Result<[u8; PUBKEY_SIZE], NoiseError> {
        self.remote_ephemeral.ok_or(NoiseError::InvalidPublicKey)
    }

    fn remote_static_key(&self) -> Result<[u8; PUBKEY_SIZE], NoiseError> {
        self.remote_static.ok_or(NoiseError::InvalidPublicKey)
    }

    /// Write message 1 (initiator only): `-> e`.
    pub fn write_message_1(&mut self) -> Result<Vec<u8>, NoiseError> {
        self.expect_state(HandshakeRole::Initiator, HandshakeProgress::Initial)?;

        let e_pub = self.generate_ephemeral();
        let mut message = Vec::with_capacity(HANDSHAKE_MSG1_SIZE);

        // -> e
        message.extend_from_slice(&e_pub);
        self.symmetric.mix_hash(&e_pub);

        // Empty payload, no key yet so it passes through as nothing
        message.extend_from_slice(&self.symmetric.encrypt_and_hash(&[])?);

        self.progress = HandshakeProgress::Message1Done;
        Ok(message)
    }

    /// Read message 1 (responder only).
    pub fn read_message_1(&mut self, message: &[u8]) -> Result<(), NoiseError> {
        self.expect_state(HandshakeRole::Responder, HandshakeProgress::Initial)?;
        check_len(message, HANDSHAKE_MSG1_SIZE)?;

        // -> e
        let re = read_key(&message[..PUBKEY_SIZE]);
        self.remote_ephemeral = Some(re);
        self.symmetric.mix_hash(&re);

        self.symmetric.decrypt_and_hash(&message[PUBKEY_SIZE..])?;

        self.progress = HandshakeProgress::Message1Done;
        Ok(())
    }

    /// Write message 2 (responder only): `<- e, ee, s, es`.
    pub fn write_message_2(&mut self) -> Result<Vec<u8>, NoiseError> {
        self.expect_state(HandshakeRole::Responder, HandshakeProgress::Message1Done)?;
        let re = self.remote_ephemeral()?;

        let e_pub = self.generate_ephemeral();
        let mut message = Vec::with_capacity(HANDSHAKE_MSG2_SIZE);

        // <- e
        message.extend_from_slice(&e_pub);
        self.symmetric.mix_hash(&e_pub);

        // <- ee
        let ee = dh(self.ephemeral()?, &re)?;
        self.symmetric.mix_key(&ee)?;

        // <- s
        let s_pub = PublicKey::from(&self.static_secret).to_bytes();
        let encrypted_static = self.symmetric.encrypt_and_hash(&s_pub)?;
        message.extend_from_slice(&encrypted_static);

        // <- es: initiator's ephemeral with our static
        let es = dh(&self.static_secret, &re)?;
        self.symmetric.mix_key(&es)?;

        message.extend_from_slice(&self.symmetric.encrypt_and_hash(&[])?);

        self.progress = HandshakeProgress::Message2Done;
        Ok(message)
    }

    /// Read message 2 (initiator only). Learns the responder's static key.
    pub fn read_message_2(&mut self, message: &[u8]) -> Result<(), NoiseError> {
        self.expect_state(HandshakeRole::Initiator, HandshakeProgress::Message1Done)?;
        check_len(message, HANDSHAKE_MSG2_SIZE)?;

        // <- e
        let re = read_key(&message[..PUBKEY_SIZE]);
        self.remote_ephemeral = Some(re);
        self.symmetric.mix_hash(&re);

        // <- ee
        let ee = dh(self.ephemeral()?, &re)?;
        self.symmetric.mix_key(&ee)?;

        // <- s
        let static_end = PUBKEY_SIZE + ENCRYPTED_STATIC_SIZE;
        let decrypted = self
            .symmetric
            .decrypt_and_hash(&message[PUBKEY_SIZE..static_end])?;
        let rs = read_key(&decrypted);
        self.remote_static = Some(rs);

        // <- es: our ephemeral with responder's static
        let es = dh(self.ephemeral()?, &rs)?;
        self.symmetric.mix_key(&es)?;

        self.symmetric.decrypt_and_hash(&message[static_end..])?;

        self.progress = HandshakeProgress::Message2Done;
        Ok(())
    }

    /// Write message 3 (initiator only): `-> s, se`.
    pub fn write_message_3(&mut self) -> Result<Vec<u8>, NoiseError> {
        self.expect_state(HandshakeRole::Initiator, HandshakeProgress::Message2Done)?;
        let re = self.remote_ephemeral()?;

        let mut message = Vec::with_capacity(HANDSHAKE_MSG3_SIZE);

        // -> s
        let s_pub = PublicKey::from(&self.static_secret).to_bytes();
        let encrypted_static = self.symmetric.encrypt_and_hash(&s_pub)?;
        message.extend_from_slice(&encrypted_static);

        // -> se: our static with responder's ephemeral
        let se = dh(&self.static_secret, &re)?;
        self.symmetric.mix_key(&se)?;

        message.extend_from_slice(&self.symmetric.encrypt_and_hash(&[])?);

        self.progress = HandshakeProgress::Complete;
        Ok(message)
    }

    /// Read message 3 (responder only). Learns the initiator's static key.
    pub fn read_message_3(&mut self, message: &[u8]) -> Result<(), NoiseError> {
        self.expect_state(HandshakeRole::Responder, HandshakeProgress::Message2Done)?;
        check_len(message, HANDSHAKE_MSG3_SIZE)?;

        // -> s
        let decrypted = self
            .symmetric
            .decrypt_and_hash(&message[..ENCRYPTED_STATIC_SIZE])?;
        let rs = read_key(&decrypted);
        self.remote_static = Some(rs);

        // -> se: our ephemeral with initiator's static
        let se = dh(self.ephemeral()?, &rs)?;
        self.symmetric.mix_key(&se)?;

        self.symmetric
            .decrypt_and_hash(&message[ENCRYPTED_STATIC_SIZE..])?;

        self.progress = HandshakeProgress::Complete;
        Ok(())
    }

    /// Split into transport ciphers. Fails unless all three messages are done.
    pub fn into_session(self) -> Result<NoiseSession, NoiseError> {
        if !self.is_complete() {
            return Err(NoiseError::HandshakeNotComplete);
        }

        let (c1, c2) = self.symmetric.split()?;
        let handshake_hash = self.symmetric.handshake_hash();
        let remote_static = self.remote_static_key()?;

        // Initiator sends with c1, receives with c2
        // Responder sends with c2, receives with c1
        let (send_cipher, recv_cipher) = match self.role {
            HandshakeRole::Initiator => (c1, c2),
            HandshakeRole::Responder => (c2, c1),
        };

        Ok(NoiseSession::from_handshake(
            self.role,
            send_cipher,
            recv_cipher,
            handshake_hash,
            remote_static,
        ))
    }

    /// Transcript hash; final once the handshake is complete.
    pub fn handshake_hash(&self) -> [u8; 32] {
        self.symmetric.handshake_hash()
    }
}

fn check_len(message: &[u8], expected: usize) -> Result<(), NoiseError> {
    if message.len() != expected {
        return Err(NoiseError::InvalidLength {
            expected,
            got: message.len(),
        });
    }
    Ok(())
}

/// Callers have already checked the slice length.
fn read_key(bytes: &[u8]) -> [u8; PUBKEY_SIZE] {
    let mut key = [0u8; PUBKEY_SIZE];
    key.copy_from_slice(&bytes[..PUBKEY_SIZE]);
    key
}

/// X25519 DH, rejecting low-order points that yield an all-zero secret.
fn dh(secret: &StaticSecret, public: &[u8; PUBKEY_SIZE]) -> Result<[u8; 32], NoiseError> {
    let shared = secret.diffie_hellman(&PublicKey::from(*public));
    if !shared.was_contributory() {
        return Err(NoiseError::InvalidPublicKey);
    }
    Ok(*shared.as_bytes())
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeState")
            .field("role", &self.role)
            .field("progress", &self.progress)
            .field("has_ephemeral", &self.ephemeral.is_some())
            .field("has_remote_static", &self.remote_static.is_some())
            .field("has_remote_ephemeral", &self.remote_ephemeral.is_some())
            .finish()
    }
}
