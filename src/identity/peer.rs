//! Remote peer identity (public keys only, no signing capability).

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::{IdentityError, PeerId, PUBLIC_KEY_SIZE};
use crate::packet::SIGNATURE_SIZE;

/// A known peer's public keys, as learned from its announce.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    noise_public_key: [u8; PUBLIC_KEY_SIZE],
    verifying_key: VerifyingKey,
    peer_id: PeerId,
}

impl PeerIdentity {
    /// Build from the announced key pair.
    ///
    /// Fails if the signing key is not a valid Ed25519 point.
    pub fn new(
        noise_public_key: [u8; PUBLIC_KEY_SIZE],
        signing_public_key: [u8; PUBLIC_KEY_SIZE],
    ) -> Result<Self, IdentityError> {
        let verifying_key = VerifyingKey::from_bytes(&signing_public_key)
            .map_err(|_| IdentityError::InvalidSigningKey)?;
        Ok(Self {
            noise_public_key,
            verifying_key,
            peer_id: PeerId::derive(&noise_public_key),
        })
    }

    /// PeerId derived from the Noise static key.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn noise_public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.noise_public_key
    }

    pub fn signing_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.verifying_key.to_bytes()
    }

    /// Verify a detached signature from this peer.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> Result<(), IdentityError> {
        verify_signature(&self.verifying_key, message, signature)
    }
}

impl std::fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerIdentity")
            .field("peer_id", &self.peer_id)
            .finish()
    }
}

/// Verify a detached Ed25519 signature against a raw public key.
pub fn verify_with_key(
    signing_public_key: &[u8; PUBLIC_KEY_SIZE],
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<(), IdentityError> {
    let key = VerifyingKey::from_bytes(signing_public_key)
        .map_err(|_| IdentityError::InvalidSigningKey)?;
    verify_signature(&key, message, signature)
}

fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<(), IdentityError> {
    let sig = Signature::from_bytes(signature);
    key.verify(message, &sig)
        .map_err(|_| IdentityError::SignatureVerificationFailed)
}
