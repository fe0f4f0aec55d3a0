//! Mesh Payload Formats
//!
//! Packet payloads that carry structure: the signed presence announce, and
//! the private message carried inside Noise transport ciphertext. Both use
//! one-byte-type, one-byte-length TLV entries.
//!
//! Broadcast messages and leave notices carry raw UTF-8 and need no codec.

mod announce;
mod error;
mod private_message;
mod tlv;

pub use announce::{AnnouncementPacket, MAX_NEIGHBORS};
pub use error::ProtocolError;
pub use private_message::{EncryptedPayload, PrivateMessage};
pub use tlv::MAX_VALUE_LEN;

#[cfg(test)]
mod tests;
