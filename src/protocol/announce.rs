//! Announce payload: nickname, public keys, and direct neighbors.

use super::tlv::{self, TlvReader};
use super::ProtocolError;
use crate::identity::{PeerId, PEER_ID_SIZE, PUBLIC_KEY_SIZE};

const TLV_NICKNAME: u8 = 0x01;
const TLV_NOISE_PUBLIC_KEY: u8 = 0x02;
const TLV_SIGNING_PUBLIC_KEY: u8 = 0x03;
const TLV_DIRECT_NEIGHBORS: u8 = 0x04;

/// Most neighbors listed in one announce.
pub const MAX_NEIGHBORS: usize = 10;

/// Presence broadcast.
///
/// Carries everything a receiver needs to bind later traffic to the
/// sender: the Noise static key (from which the sender id derives) and the
/// Ed25519 key that verifies the sender's packet signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncementPacket {
    pub nickname: String,
    pub noise_public_key: [u8; PUBLIC_KEY_SIZE],
    pub signing_public_key: [u8; PUBLIC_KEY_SIZE],
    /// Peers heard directly by the sender. Empty when not advertised.
    pub direct_neighbors: Vec<PeerId>,
}

impl AnnouncementPacket {
    pub fn new(
        nickname: impl Into<String>,
        noise_public_key: [u8; PUBLIC_KEY_SIZE],
        signing_public_key: [u8; PUBLIC_KEY_SIZE],
    ) -> Self {
        Self {
            nickname: nickname.into(),
            noise_public_key,
            signing_public_key,
            direct_neighbors: Vec::new(),
        }
    }

    /// Attach a neighbor list, keeping at most [`MAX_NEIGHBORS`].
    pub fn with_neighbors(mut self, neighbors: impl IntoIterator<Item = PeerId>) -> Self {
        self.direct_neighbors = neighbors.into_iter().take(MAX_NEIGHBORS).collect();
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.direct_neighbors.len() > MAX_NEIGHBORS {
            return Err(ProtocolError::TooManyNeighbors {
                max: MAX_NEIGHBORS,
                got: self.direct_neighbors.len(),
            });
        }

        let mut buf = Vec::with_capacity(
            6 + self.nickname.len() + 2 * PUBLIC_KEY_SIZE + 2 + MAX_NEIGHBORS * PEER_ID_SIZE,
        );
        tlv::write(&mut buf, TLV_NICKNAME, self.nickname.as_bytes())?;
        tlv::write(&mut buf, TLV_NOISE_PUBLIC_KEY, &self.noise_public_key)?;
        tlv::write(&mut buf, TLV_SIGNING_PUBLIC_KEY, &self.signing_public_key)?;

        if !self.direct_neighbors.is_empty() {
            let neighbors: Vec<u8> = self
                .direct_neighbors
                .iter()
                .flat_map(|id| id.as_bytes().iter().copied())
                .collect();
            tlv::write(&mut buf, TLV_DIRECT_NEIGHBORS, &neighbors)?;
        }
        Ok(buf)
    }

    /// Decode, skipping unknown TLV types.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut nickname = None;
        let mut noise_public_key = None;
        let mut signing_public_key = None;
        let mut direct_neighbors = Vec::new();

        for entry in TlvReader::new(data) {
            let (field, value) = entry?;
            match field {
                TLV_NICKNAME => nickname = Some(tlv::utf8(field, value)?),
                TLV_NOISE_PUBLIC_KEY => noise_public_key = Some(tlv::fixed(field, value)?),
                TLV_SIGNING_PUBLIC_KEY => signing_public_key = Some(tlv::fixed(field, value)?),
                TLV_DIRECT_NEIGHBORS => {
                    if value.len() % PEER_ID_SIZE != 0 {
                        return Err(ProtocolError::InvalidFieldLength {
                            field,
                            expected: (value.len() / PEER_ID_SIZE) * PEER_ID_SIZE,
                            got: value.len(),
                        });
                    }
                    let count = value.len() / PEER_ID_SIZE;
                    if count > MAX_NEIGHBORS {
                        return Err(ProtocolError::TooManyNeighbors {
                            max: MAX_NEIGHBORS,
                            got: count,
                        });
                    }
                    direct_neighbors = value
                        .chunks_exact(PEER_ID_SIZE)
                        .map(|chunk| tlv::fixed::<PEER_ID_SIZE>(field, chunk).map(PeerId::from_bytes))
                        .collect::<Result<_, _>>()?;
                }
                _ => {}
            }
        }

        Ok(Self {
            nickname: nickname.ok_or(ProtocolError::MissingField(TLV_NICKNAME))?,
            noise_public_key: noise_public_key
                .ok_or(ProtocolError::MissingField(TLV_NOISE_PUBLIC_KEY))?,
            signing_public_key: signing_public_key
                .ok_or(ProtocolError::MissingField(TLV_SIGNING_PUBLIC_KEY))?,
            direct_neighbors,
        })
    }

    /// PeerId the announced Noise key derives to.
    pub fn derived_peer_id(&self) -> PeerId {
        PeerId::derive(&self.noise_public_key)
    }
}
