//! Mesh Identity System
//!
//! Each node owns two keypairs: an X25519 static key used by the Noise
//! handshake, and an Ed25519 key used to sign packets. The PeerId that
//! appears in every packet header is derived from the Noise static public
//! key via truncated SHA-256, so the handshake can bind a session to the
//! sender id it claims.

mod local;
mod peer;
mod peer_id;

use thiserror::Error;

pub use local::{Identity, NOISE_STATIC_KEY_NAME, SIGNING_KEY_NAME};
pub use peer::{verify_with_key, PeerIdentity};
pub use peer_id::{PeerId, PEER_ID_HEX_LEN, PEER_ID_SIZE};

/// Size of an X25519 or Ed25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("peer id mismatch: configured {configured}, derived {derived}")]
    Mismatch { configured: PeerId, derived: PeerId },

    #[error("invalid peer id length: expected {PEER_ID_HEX_LEN} hex chars, got {0}")]
    InvalidPeerIdLength(usize),

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid key length for {name}: expected 32, got {got}")]
    InvalidKeyLength { name: &'static str, got: usize },

    #[error("invalid signing public key")]
    InvalidSigningKey,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Check a configured PeerId against the one derived from the static key.
///
/// A mismatch means the node advertises an id that peers cannot bind to
/// its handshake key. Callers log it; it never stops the node.
pub fn validate_identity(
    configured: &PeerId,
    static_public_key: &[u8; PUBLIC_KEY_SIZE],
) -> Result<(), IdentityError> {
    let derived = PeerId::derive(static_public_key);
    if &derived != configured {
        return Err(IdentityError::Mismatch {
            configured: *configured,
            derived,
        });
    }
    Ok(())
}
