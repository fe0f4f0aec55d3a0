//! Private message carried inside Noise transport ciphertext.

use super::tlv::{self, TlvReader};
use super::ProtocolError;

const TLV_MESSAGE_ID: u8 = 0x00;
const TLV_CONTENT: u8 = 0x01;

/// A direct message: an id the sender can correlate with, and the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateMessage {
    pub message_id: String,
    pub content: String,
}

impl PrivateMessage {
    pub fn new(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: content.into(),
        }
    }

    /// Encode as TLV. Fails if either field exceeds 255 bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(4 + self.message_id.len() + self.content.len());
        tlv::write(&mut buf, TLV_MESSAGE_ID, self.message_id.as_bytes())?;
        tlv::write(&mut buf, TLV_CONTENT, self.content.as_bytes())?;
        Ok(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut message_id = None;
        let mut content = None;
        for entry in TlvReader::new(data) {
            let (field, value) = entry?;
            match field {
                TLV_MESSAGE_ID => message_id = Some(tlv::utf8(field, value)?),
                TLV_CONTENT => content = Some(tlv::utf8(field, value)?),
                _ => {}
            }
        }
        Ok(Self {
            message_id: message_id.ok_or(ProtocolError::MissingField(TLV_MESSAGE_ID))?,
            content: content.ok_or(ProtocolError::MissingField(TLV_CONTENT))?,
        })
    }
}

/// Plaintext of a Noise transport message: a one-byte tag then the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncryptedPayload {
    PrivateMessage(PrivateMessage),
}

impl EncryptedPayload {
    const TAG_PRIVATE_MESSAGE: u8 = 0x01;

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            EncryptedPayload::PrivateMessage(pm) => {
                let body = pm.encode()?;
                let mut buf = Vec::with_capacity(1 + body.len());
                buf.push(Self::TAG_PRIVATE_MESSAGE);
                buf.extend_from_slice(&body);
                Ok(buf)
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, body) = data.split_first().ok_or(ProtocolError::Empty)?;
        match tag {
            Self::TAG_PRIVATE_MESSAGE => Ok(EncryptedPayload::PrivateMessage(
                PrivateMessage::decode(body)?,
            )),
            other => Err(ProtocolError::UnknownPayloadType(other)),
        }
    }
}
