use super::{
    CipherState, HandshakeRole, NoiseError, ReplayWindow, COUNTER_SIZE, PUBKEY_SIZE, TAG_SIZE,
};
use std::fmt;

/// Completed Noise session for transport encryption.
///
/// Outgoing messages are `counter (8, BE) || ciphertext`. Incoming messages
/// are checked against a replay window before and recorded after
/// successful decryption.
pub struct NoiseSession {
    /// Our role in the original handshake.
    role: HandshakeRole,
    /// Cipher for sending.
    send_cipher: CipherState,
    /// Cipher for receiving.
    recv_cipher: CipherState,
    /// Handshake hash for channel binding.
    handshake_hash: [u8; 32],
    /// Remote peer's static public key.
    remote_static: [u8; PUBKEY_SIZE],
    /// Receive-side replay protection.
    replay: ReplayWindow,
}

impl NoiseSession {
    pub(super) fn from_handshake(
        role: HandshakeRole,
        send_cipher: CipherState,
        recv_cipher: CipherState,
        handshake_hash: [u8; 32],
        remote_static: [u8; PUBKEY_SIZE],
    ) -> Self {
        Self {
            role,
            send_cipher,
            recv_cipher,
            handshake_hash,
            remote_static,
            replay: ReplayWindow::new(),
        }
    }

    /// Encrypt a message for sending, prefixed with its counter.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        let counter = self.send_cipher.nonce();
        let ciphertext = self.send_cipher.encrypt(plaintext)?;
        let mut out = Vec::with_capacity(COUNTER_SIZE + ciphertext.len());
        out.extend_from_slice(&counter.to_be_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a received counter-prefixed message.
    pub fn decrypt(&mut self, message: &[u8]) -> Result<Vec<u8>, NoiseError> {
        if message.len() < COUNTER_SIZE + TAG_SIZE {
            return Err(NoiseError::MessageTooShort {
                expected: COUNTER_SIZE + TAG_SIZE,
                got: message.len(),
            });
        }
        let mut counter_bytes = [0u8; COUNTER_SIZE];
        counter_bytes.copy_from_slice(&message[..COUNTER_SIZE]);
        let counter = u64::from_be_bytes(counter_bytes);

        if !self.replay.check(counter) {
            return Err(NoiseError::ReplayDetected(counter));
        }
        let plaintext = self
            .recv_cipher
            .decrypt_with_counter(&message[COUNTER_SIZE..], counter)?;
        self.replay.accept(counter);
        Ok(plaintext)
    }

    /// Get the handshake hash for channel binding.
    pub fn handshake_hash(&self) -> &[u8; 32] {
        &self.handshake_hash
    }

    /// Get the remote peer's static public key.
    pub fn remote_static(&self) -> &[u8; PUBKEY_SIZE] {
        &self.remote_static
    }

    /// Get our role in the handshake.
    pub fn role(&self) -> HandshakeRole {
        self.role
    }

    /// Next send counter.
    pub fn send_nonce(&self) -> u64 {
        self.send_cipher.nonce()
    }
}

impl fmt::Debug for NoiseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseSession")
            .field("role", &self.role)
            .field("send_nonce", &self.send_cipher.nonce())
            .field("replay", &self.replay)
            .field("handshake_hash", &hex::encode(&self.handshake_hash[..8]))
            .finish()
    }
}
