//! Noise XX Protocol for Peer Sessions
//!
//! Implements the Noise Protocol Framework XX pattern over X25519 to turn
//! the unauthenticated broadcast mesh into pairwise authenticated,
//! encrypted channels.
//!
//! Neither side knows the other's static key in advance. Both statics are
//! transmitted encrypted, and the caller binds the learned remote static to
//! the sender's PeerId once the handshake finishes.
//!
//! ## Handshake Pattern
//!
//! ```text
//!   -> e                 (32 bytes)
//!   <- e, ee, s, es      (96 bytes)
//!   -> s, se             (64 bytes)
//! ```
//!
//! The prologue and all handshake payloads are empty.
//!
//! ## Transport Messages
//!
//! After the handshake each direction has its own cipher. Every transport
//! message carries its 8-byte big-endian counter in clear ahead of the
//! AEAD output, so the receiver can decrypt out of order and reject
//! replays with a sliding window.

mod handshake;
mod replay;
mod session;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

pub use handshake::HandshakeState;
pub use replay::ReplayWindow;
pub use session::NoiseSession;

/// Protocol name. Exactly 32 bytes, so it is used as the initial hash
/// without hashing.
pub(crate) const PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_ChaChaPoly_SHA256";

/// Maximum message size for noise transport messages.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Size of the AEAD tag.
pub const TAG_SIZE: usize = 16;

/// Size of an X25519 public key.
pub const PUBKEY_SIZE: usize = 32;

/// Size of the explicit counter prefix on transport messages.
pub const COUNTER_SIZE: usize = 8;

/// Size of handshake message 1: ephemeral.
pub const HANDSHAKE_MSG1_SIZE: usize = PUBKEY_SIZE;

/// Size of handshake message 2: ephemeral + encrypted static + empty payload tag.
pub const HANDSHAKE_MSG2_SIZE: usize = PUBKEY_SIZE + PUBKEY_SIZE + TAG_SIZE + TAG_SIZE;

/// Size of handshake message 3: encrypted static + empty payload tag.
pub const HANDSHAKE_MSG3_SIZE: usize = PUBKEY_SIZE + TAG_SIZE + TAG_SIZE;

/// Replay window size in messages.
pub const REPLAY_WINDOW_SIZE: usize = 1024;

/// Errors from Noise protocol operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoiseError {
    #[error("handshake not complete")]
    HandshakeNotComplete,

    #[error("wrong handshake state: expected {expected}, got {got}")]
    WrongState { expected: String, got: String },

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("message too large: {size} > {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("message too short: expected at least {expected}, got {got}")]
    MessageTooShort { expected: usize, got: usize },

    #[error("invalid handshake message length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("nonce overflow")]
    NonceOverflow,

    #[error("replay detected: counter {0} already seen or too old")]
    ReplayDetected(u64),
}

/// Role in the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeRole {
    /// We sent message 1.
    Initiator,
    /// They sent message 1.
    Responder,
}

impl fmt::Display for HandshakeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeRole::Initiator => write!(f, "initiator"),
            HandshakeRole::Responder => write!(f, "responder"),
        }
    }
}

/// Handshake state machine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeProgress {
    /// Ready to send/receive message 1.
    Initial,
    /// Message 1 sent/received.
    Message1Done,
    /// Message 2 sent/received.
    Message2Done,
    /// Handshake complete, ready for transport.
    Complete,
}

impl fmt::Display for HandshakeProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeProgress::Initial => write!(f, "initial"),
            HandshakeProgress::Message1Done => write!(f, "message1_done"),
            HandshakeProgress::Message2Done => write!(f, "message2_done"),
            HandshakeProgress::Complete => write!(f, "complete"),
        }
    }
}

/// One direction's AEAD key and nonce counter.
///
/// During the handshake the nonce is implicit. In the transport phase the
/// sender still counts up, but the receiver takes the counter from the
/// wire via [`CipherState::decrypt_with_counter`]. Counter `u64::MAX` is
/// never used.
#[derive(Clone)]
pub struct CipherState {
    key: [u8; 32],
    nonce: u64,
    has_key: bool,
}

impl CipherState {
    pub(crate) fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            nonce: 0,
            has_key: true,
        }
    }

    /// A keyless cipher: payloads pass through unencrypted.
    pub(super) fn empty() -> Self {
        Self {
            key: [0u8; 32],
            nonce: 0,
            has_key: false,
        }
    }

    pub(super) fn initialize_key(&mut self, key: [u8; 32]) {
        self.key = key;
        self.nonce = 0;
        self.has_key = true;
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, NoiseError> {
        self.encrypt_with_ad(plaintext, &[])
    }

    /// Seal `plaintext` under the next nonce, authenticating `ad`.
    ///
    /// Without a key the plaintext passes through unchanged, as Noise
    /// requires before the first DH.
    pub fn encrypt_with_ad(&mut self, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>, NoiseError> {
        if !self.has_key {
            return Ok(plaintext.to_vec());
        }
        let limit = MAX_MESSAGE_SIZE - TAG_SIZE;
        if plaintext.len() > limit {
            return Err(NoiseError::MessageTooLarge {
                size: plaintext.len(),
                max: limit,
            });
        }

        let counter = self.nonce;
        let next = Self::advance(counter)?;
        let sealed = self
            .aead()
            .encrypt(&nonce_for(counter), Payload { msg: plaintext, aad: ad })
            .map_err(|_| NoiseError::EncryptionFailed)?;
        self.nonce = next;
        Ok(sealed)
    }

    /// Open `ciphertext` under the implicit nonce, authenticating `ad`.
    ///
    /// The counter only advances when the tag verifies.
    pub fn decrypt_with_ad(&mut self, ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>, NoiseError> {
        if !self.has_key {
            return Ok(ciphertext.to_vec());
        }
        let counter = self.nonce;
        let next = Self::advance(counter)?;
        let plaintext = self.open(counter, ciphertext, ad)?;
        self.nonce = next;
        Ok(plaintext)
    }

    /// Open a transport message whose counter came off the wire.
    ///
    /// Replay checks are the caller's job.
    pub fn decrypt_with_counter(&self, ciphertext: &[u8], counter: u64) -> Result<Vec<u8>, NoiseError> {
        if !self.has_key {
            return Ok(ciphertext.to_vec());
        }
        self.open(counter, ciphertext, &[])
    }

    /// Next value to be used as the sending counter.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    fn open(&self, counter: u64, ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>, NoiseError> {
        if ciphertext.len() < TAG_SIZE {
            return Err(NoiseError::MessageTooShort {
                expected: TAG_SIZE,
                got: ciphertext.len(),
            });
        }
        self.aead()
            .decrypt(&nonce_for(counter), Payload { msg: ciphertext, aad: ad })
            .map_err(|_| NoiseError::DecryptionFailed)
    }

    fn advance(counter: u64) -> Result<u64, NoiseError> {
        if counter == u64::MAX {
            return Err(NoiseError::NonceOverflow);
        }
        Ok(counter + 1)
    }
}

/// 96-bit AEAD nonce: four zero bytes, then the little-endian counter.
fn nonce_for(counter: u64) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(&counter.to_le_bytes());
    Nonce::from(bytes)
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("has_key", &self.has_key)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
