//! Mesh Packet Codec
//!
//! Binary framing for every packet carried over the mesh transport, and the
//! canonical byte sequence that packet signatures cover.
//!
//! ## Frame Layout
//!
//! ```text
//!   version(1) type(1) ttl(1) timestamp(8) flags(1) payload_len(2)
//!   sender_id(8)
//!   [recipient_id(8)]            if FLAG_HAS_RECIPIENT
//!   [hop_count(1) hops(8*n)]     if FLAG_HAS_ROUTE
//!   payload(payload_len)
//!   [signature(64)]              if FLAG_HAS_SIGNATURE
//! ```
//!
//! All integers are big-endian. Frames may carry trailing block padding
//! (see [`padding`]) which `decode` strips again.
//!
//! ## Signing
//!
//! Signatures cover [`Packet::signing_bytes`]: the unpadded encoding of a
//! copy with the signature removed and the TTL forced to zero. Relays
//! decrement the TTL at every hop, so it cannot be part of the signed
//! material.

pub mod padding;

use crate::identity::{PeerId, PEER_ID_SIZE};
use std::fmt;
use thiserror::Error;

/// The only wire version this codec understands.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header size: version, type, ttl, timestamp, flags, payload_len.
pub const HEADER_SIZE: usize = 14;

/// Smallest valid frame: fixed header plus sender id.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + PEER_ID_SIZE;

/// Detached Ed25519 signature length.
pub const SIGNATURE_SIZE: usize = 64;

/// Hop budget for locally originated packets.
pub const DEFAULT_TTL: u8 = 7;

/// Largest encodable payload.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest encodable route.
pub const MAX_ROUTE_HOPS: usize = u8::MAX as usize;

pub const FLAG_HAS_RECIPIENT: u8 = 0x01;
pub const FLAG_HAS_SIGNATURE: u8 = 0x02;
pub const FLAG_IS_COMPRESSED: u8 = 0x04;
pub const FLAG_HAS_ROUTE: u8 = 0x08;

const KNOWN_FLAGS: u8 = FLAG_HAS_RECIPIENT | FLAG_HAS_SIGNATURE | FLAG_HAS_ROUTE;

/// Errors from packet encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("frame too short: expected at least {expected}, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("unsupported packet version: {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported flags: 0x{0:02x}")]
    UnsupportedFlags(u8),

    #[error("payload too large: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("route too long: {hops} > {max}")]
    RouteTooLong { hops: usize, max: usize },

    #[error("{0} trailing bytes after packet body")]
    TrailingBytes(usize),
}

/// Packet type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Signed presence broadcast (nickname + keys + neighbors).
    Announce,
    /// Plaintext broadcast chat message.
    Message,
    /// Orderly departure notice.
    Leave,
    /// Noise handshake message, addressed.
    NoiseHandshake,
    /// Noise transport ciphertext, addressed.
    NoiseEncrypted,
    /// Continuation of an oversized payload. Not reassembled.
    Fragment,
}

impl PacketType {
    /// Wire code for this type.
    pub fn to_byte(self) -> u8 {
        match self {
            PacketType::Announce => 0x01,
            PacketType::Message => 0x02,
            PacketType::Leave => 0x03,
            PacketType::NoiseHandshake => 0x10,
            PacketType::NoiseEncrypted => 0x11,
            PacketType::Fragment => 0x20,
        }
    }

    /// Parse a wire code. Returns `None` for unknown codes.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(PacketType::Announce),
            0x02 => Some(PacketType::Message),
            0x03 => Some(PacketType::Leave),
            0x10 => Some(PacketType::NoiseHandshake),
            0x11 => Some(PacketType::NoiseEncrypted),
            0x20 => Some(PacketType::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketType::Announce => "announce",
            PacketType::Message => "message",
            PacketType::Leave => "leave",
            PacketType::NoiseHandshake => "noise_handshake",
            PacketType::NoiseEncrypted => "noise_encrypted",
            PacketType::Fragment => "fragment",
        };
        write!(f, "{}", s)
    }
}

/// A single mesh packet.
///
/// `packet_type` is kept as the raw wire byte so that packets of types this
/// node does not understand still decode (and can be logged by type code).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub packet_type: u8,
    pub sender_id: PeerId,
    /// `None` means broadcast.
    pub recipient_id: Option<PeerId>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub payload: Vec<u8>,
    pub signature: Option<[u8; SIGNATURE_SIZE]>,
    pub ttl: u8,
    pub route: Option<Vec<PeerId>>,
}

impl Packet {
    /// Create an unsigned version-1 packet with no route.
    pub fn new(
        packet_type: PacketType,
        sender_id: PeerId,
        recipient_id: Option<PeerId>,
        timestamp: u64,
        payload: Vec<u8>,
        ttl: u8,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            packet_type: packet_type.to_byte(),
            sender_id,
            recipient_id,
            timestamp,
            payload,
            signature: None,
            ttl,
            route: None,
        }
    }

    /// The known packet type, if any.
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_byte(self.packet_type)
    }

    /// Whether this packet has no recipient.
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none()
    }

    /// Serialize to a wire frame, optionally padded to a block size.
    pub fn encode(&self, pad: bool) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if let Some(route) = &self.route
            && route.len() > MAX_ROUTE_HOPS
        {
            return Err(PacketError::RouteTooLong {
                hops: route.len(),
                max: MAX_ROUTE_HOPS,
            });
        }

        let mut flags = 0u8;
        if self.recipient_id.is_some() {
            flags |= FLAG_HAS_RECIPIENT;
        }
        if self.signature.is_some() {
            flags |= FLAG_HAS_SIGNATURE;
        }
        if self.route.is_some() {
            flags |= FLAG_HAS_ROUTE;
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.version);
        buf.push(self.packet_type);
        buf.push(self.ttl);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(flags);
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(self.sender_id.as_bytes());

        if let Some(recipient) = &self.recipient_id {
            buf.extend_from_slice(recipient.as_bytes());
        }
        if let Some(route) = &self.route {
            buf.push(route.len() as u8);
            for hop in route {
                buf.extend_from_slice(hop.as_bytes());
            }
        }

        buf.extend_from_slice(&self.payload);

        if let Some(sig) = &self.signature {
            buf.extend_from_slice(sig);
        }

        if pad {
            padding::pad(&mut buf);
        }

        Ok(buf)
    }

    /// Parse a wire frame, stripping block padding if present.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(PacketError::TooShort {
                expected: MIN_FRAME_SIZE,
                got: data.len(),
            });
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(PacketError::UnsupportedVersion(version));
        }

        let packet_type = data[1];
        let ttl = data[2];
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&data[3..11]);
        let timestamp = u64::from_be_bytes(ts);
        let flags = data[11];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(PacketError::UnsupportedFlags(flags));
        }
        let payload_len = u16::from_be_bytes([data[12], data[13]]) as usize;

        let mut reader = Reader::new(data, HEADER_SIZE);
        let sender_id = reader.peer_id()?;

        let recipient_id = if flags & FLAG_HAS_RECIPIENT != 0 {
            Some(reader.peer_id()?)
        } else {
            None
        };

        let route = if flags & FLAG_HAS_ROUTE != 0 {
            let hops = reader.take(1)?[0] as usize;
            let mut route = Vec::with_capacity(hops);
            for _ in 0..hops {
                route.push(reader.peer_id()?);
            }
            Some(route)
        } else {
            None
        };

        let payload = reader.take(payload_len)?.to_vec();

        let signature = if flags & FLAG_HAS_SIGNATURE != 0 {
            let mut sig = [0u8; SIGNATURE_SIZE];
            sig.copy_from_slice(reader.take(SIGNATURE_SIZE)?);
            Some(sig)
        } else {
            None
        };

        let trailing = reader.remaining();
        if !trailing.is_empty() && !padding::is_valid_padding(trailing) {
            return Err(PacketError::TrailingBytes(trailing.len()));
        }

        Ok(Self {
            version,
            packet_type,
            sender_id,
            recipient_id,
            timestamp,
            payload,
            signature,
            ttl,
            route,
        })
    }

    /// Bytes covered by the packet signature.
    ///
    /// Encodes a copy with `signature = None` and `ttl = 0`; every other
    /// field is kept as-is. Never padded.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, PacketError> {
        let canonical = Packet {
            signature: None,
            ttl: 0,
            ..self.clone()
        };
        canonical.encode(false)
    }

    /// Unpadded encoded size.
    pub fn encoded_len(&self) -> usize {
        let mut len = MIN_FRAME_SIZE + self.payload.len();
        if self.recipient_id.is_some() {
            len += PEER_ID_SIZE;
        }
        if let Some(route) = &self.route {
            len += 1 + route.len() * PEER_ID_SIZE;
        }
        if self.signature.is_some() {
            len += SIGNATURE_SIZE;
        }
        len
    }
}

/// Bounds-checked cursor over a frame.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PacketError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(PacketError::TooShort {
                expected: end,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn peer_id(&mut self) -> Result<PeerId, PacketError> {
        let bytes = self.take(PEER_ID_SIZE)?;
        let mut id = [0u8; PEER_ID_SIZE];
        id.copy_from_slice(bytes);
        Ok(PeerId::from_bytes(id))
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests;
