//! 8-byte peer identifier derived from truncated SHA-256(noise static key).

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::{IdentityError, PUBLIC_KEY_SIZE};

/// Raw PeerId length in bytes.
pub const PEER_ID_SIZE: usize = 8;

/// PeerId length as lowercase hex.
pub const PEER_ID_HEX_LEN: usize = PEER_ID_SIZE * 2;

/// 8-byte peer identifier.
///
/// The first 8 bytes of SHA-256 over the peer's Noise static public key.
/// Displayed and parsed as 16 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Create a PeerId from raw bytes.
    pub fn from_bytes(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a PeerId from a slice, checking its length.
    pub fn from_slice(slice: &[u8]) -> Result<Self, IdentityError> {
        if slice.len() != PEER_ID_SIZE {
            return Err(IdentityError::InvalidPeerIdLength(slice.len() * 2));
        }
        let mut bytes = [0u8; PEER_ID_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive the PeerId for a Noise static public key.
    pub fn derive(static_public_key: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        let hash = Sha256::digest(static_public_key);
        let mut bytes = [0u8; PEER_ID_SIZE];
        bytes.copy_from_slice(&hash[..PEER_ID_SIZE]);
        Self(bytes)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for PeerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != PEER_ID_HEX_LEN {
            return Err(IdentityError::InvalidPeerIdLength(s.len()));
        }
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_hex())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
