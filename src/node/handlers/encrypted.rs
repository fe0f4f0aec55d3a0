//! Encrypted direct messages.

use crate::identity::PeerId;
use crate::node::{Node, NodeError, NodeEvent, PendingMessage};
use crate::packet::{Packet, PacketType};
use crate::protocol::{EncryptedPayload, PrivateMessage};
use tracing::{debug, warn};
use uuid::Uuid;

impl Node {
    /// Send `content` to `to`, returning the new message id.
    ///
    /// With an established session the message goes out immediately.
    /// Otherwise it is queued and a handshake is started; only the
    /// handshake message reaches the wire. A queued message stays queued
    /// when the handshake cannot be started, and is retried by the next
    /// send to the same peer or flushed if the peer handshakes first.
    pub fn send_direct_message(&mut self, content: &str, to: PeerId) -> Result<String, NodeError> {
        if to == self.peer_id() {
            return Err(NodeError::SelfAddressed);
        }

        let message_id = Uuid::new_v4().to_string();
        // Reject content the payload format cannot carry before queueing
        let payload = EncryptedPayload::PrivateMessage(PrivateMessage::new(&message_id, content));
        let plaintext = payload.encode()?;

        if self.sessions.has_established_session(&to) {
            self.send_encrypted(to, &plaintext)?;
            debug!(peer = %to, message_id = %message_id, "Direct message sent");
        } else {
            self.pending
                .enqueue(to, PendingMessage::new(&message_id, content))?;
            debug!(
                peer = %to,
                message_id = %message_id,
                queued = self.pending.len(&to),
                "Direct message queued until session is ready"
            );
            if let Err(e) = self.initiate_handshake(to) {
                warn!(peer = %to, message_id = %message_id, error = %e, "Handshake not sent, message stays queued");
            }
        }
        Ok(message_id)
    }

    fn send_encrypted(&mut self, to: PeerId, plaintext: &[u8]) -> Result<(), NodeError> {
        let ciphertext = self.sessions.encrypt(plaintext, &to)?;
        let packet = self.new_packet(PacketType::NoiseEncrypted, Some(to), ciphertext);
        self.sign_and_broadcast(packet)
    }

    /// Send everything queued for `peer`, oldest first.
    pub(in crate::node) fn flush_pending(&mut self, peer: PeerId) {
        let queued = self.pending.take(&peer);
        if queued.is_empty() {
            return;
        }
        debug!(peer = %peer, count = queued.len(), "Flushing pending messages");

        for message in queued {
            let payload = EncryptedPayload::PrivateMessage(PrivateMessage::new(
                message.message_id.clone(),
                message.content,
            ));
            let result = payload
                .encode()
                .map_err(NodeError::from)
                .and_then(|plaintext| self.send_encrypted(peer, &plaintext));
            if let Err(e) = result {
                warn!(peer = %peer, message_id = %message.message_id, error = %e, "Pending message dropped");
            }
        }
    }

    /// Handle an encrypted packet addressed to us.
    pub(in crate::node) fn handle_encrypted(&mut self, packet: &Packet) {
        let from = packet.sender_id;
        let plaintext = match self.sessions.decrypt(&packet.payload, &from) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!(peer = %from, error = %e, "Cannot decrypt, dropping");
                return;
            }
        };

        match EncryptedPayload::decode(&plaintext) {
            Ok(EncryptedPayload::PrivateMessage(message)) => {
                self.emit(NodeEvent::DirectMessage {
                    from,
                    nickname: self.nickname_of(&from),
                    message_id: message.message_id,
                    content: message.content,
                    timestamp: packet.timestamp,
                });
            }
            Err(e) => {
                debug!(peer = %from, error = %e, "Unreadable encrypted payload, dropping");
            }
        }
    }
}
