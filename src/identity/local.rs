//! Local node identity with signing capability.

use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use tracing::{info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use super::{validate_identity, IdentityError, PeerId, PUBLIC_KEY_SIZE};
use crate::keystore::KeyStore;
use crate::packet::SIGNATURE_SIZE;

/// Key store entry holding the X25519 static secret.
pub const NOISE_STATIC_KEY_NAME: &str = "noise_static_key";

/// Key store entry holding the Ed25519 signing seed.
pub const SIGNING_KEY_NAME: &str = "ed25519_signing_key";

/// The local node identity.
///
/// Holds the Noise static keypair used in handshakes, the Ed25519 key used
/// to sign outgoing packets, and the nickname advertised in announces.
///
/// The `peer_id` used as `sender_id` is normally derived from the static
/// public key. A configured value overrides it; a mismatch is reported by
/// [`Identity::validate`] but does not prevent the node from running.
pub struct Identity {
    static_secret: StaticSecret,
    static_public: [u8; PUBLIC_KEY_SIZE],
    signing_key: SigningKey,
    peer_id: PeerId,
    nickname: String,
}

impl Identity {
    /// Create a new random identity.
    pub fn generate(nickname: impl Into<String>) -> Self {
        let mut noise = random_secret();
        let mut signing = random_secret();
        let identity = Self::from_secret_bytes(&noise, &signing, nickname);
        crate::keystore::secure_zero(&mut noise);
        crate::keystore::secure_zero(&mut signing);
        identity
    }

    /// Create an identity from raw secret key bytes.
    pub fn from_secret_bytes(
        noise_secret: &[u8; 32],
        signing_secret: &[u8; 32],
        nickname: impl Into<String>,
    ) -> Self {
        let static_secret = StaticSecret::from(*noise_secret);
        let static_public = PublicKey::from(&static_secret).to_bytes();
        let signing_key = SigningKey::from_bytes(signing_secret);
        Self {
            static_secret,
            static_public,
            signing_key,
            peer_id: PeerId::derive(&static_public),
            nickname: nickname.into(),
        }
    }

    /// Load both keys from the store, generating and persisting any that
    /// are missing.
    ///
    /// `configured` overrides the derived PeerId. The override is checked
    /// against the derived value and a mismatch is logged.
    pub fn load_or_generate(
        store: &dyn KeyStore,
        nickname: impl Into<String>,
        configured: Option<PeerId>,
    ) -> Result<Self, IdentityError> {
        let mut noise = load_or_create_secret(store, NOISE_STATIC_KEY_NAME)?;
        let mut signing = load_or_create_secret(store, SIGNING_KEY_NAME)?;
        let mut identity = Self::from_secret_bytes(&noise, &signing, nickname);
        store.secure_zero(&mut noise);
        store.secure_zero(&mut signing);

        if let Some(peer_id) = configured {
            identity.peer_id = peer_id;
        }
        if let Err(e) = identity.validate() {
            warn!(error = %e, "Configured peer id does not match static key");
        }
        Ok(identity)
    }

    /// Replace the PeerId used as `sender_id`.
    pub fn with_peer_id(mut self, peer_id: PeerId) -> Self {
        self.peer_id = peer_id;
        self
    }

    /// Check the active PeerId against the static public key.
    pub fn validate(&self) -> Result<(), IdentityError> {
        validate_identity(&self.peer_id, &self.static_public)
    }

    /// The PeerId carried in outgoing packets.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The PeerId derived from the static public key.
    pub fn derived_peer_id(&self) -> PeerId {
        PeerId::derive(&self.static_public)
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    /// The X25519 static secret, for the Noise handshake.
    pub fn static_secret(&self) -> &StaticSecret {
        &self.static_secret
    }

    /// The X25519 static public key.
    pub fn static_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.static_public
    }

    /// The Ed25519 verifying key.
    pub fn signing_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign arbitrary bytes.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE], IdentityError> {
        self.signing_key
            .try_sign(message)
            .map(|sig| sig.to_bytes())
            .map_err(|e| IdentityError::SigningFailed(e.to_string()))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

fn random_secret() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn load_or_create_secret(
    store: &dyn KeyStore,
    name: &'static str,
) -> Result<[u8; 32], IdentityError> {
    if let Some(mut stored) = store.get(name) {
        if stored.len() != 32 {
            let got = stored.len();
            store.secure_zero(&mut stored);
            return Err(IdentityError::InvalidKeyLength { name, got });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&stored);
        store.secure_zero(&mut stored);
        return Ok(bytes);
    }

    let bytes = random_secret();
    if store.put(name, &bytes) {
        info!(key = name, "Generated new key");
    } else {
        warn!(key = name, "Generated new key but could not persist it");
    }
    Ok(bytes)
}
