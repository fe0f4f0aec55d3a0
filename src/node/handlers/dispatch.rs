//! Inbound frame pipeline and plaintext packet handlers.

use crate::identity::{verify_with_key, PeerIdentity};
use crate::node::{Node, NodeError, NodeEvent, PeerInfo, SeenCache};
use crate::packet::{Packet, PacketType, DEFAULT_TTL};
use crate::protocol::AnnouncementPacket;
use crate::transport::EndpointId;
use tracing::{debug, info, trace, warn};

impl Node {
    /// Process one received frame.
    pub(in crate::node) fn handle_frame(
        &mut self,
        from: Option<EndpointId>,
        data: &[u8],
        received_ms: u64,
    ) {
        let packet = match Packet::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(from = ?from, bytes = data.len(), error = %e, "Malformed frame, dropping");
                return;
            }
        };

        if packet.sender_id == self.peer_id() {
            trace!("Own packet echoed back, dropping");
            return;
        }

        let digest = match SeenCache::digest(&packet) {
            Ok(digest) => digest,
            Err(e) => {
                debug!(error = %e, "Cannot digest packet, dropping");
                return;
            }
        };
        if self.seen.contains(&digest) {
            trace!(sender = %packet.sender_id, "Duplicate packet, dropping");
            return;
        }

        let Some(kind) = packet.kind() else {
            debug!(
                sender = %packet.sender_id,
                packet_type = packet.packet_type,
                "Unknown packet type, dropping"
            );
            return;
        };

        if let Err(e) = self.verify_packet(kind, &packet) {
            warn!(sender = %packet.sender_id, packet_type = %kind, error = %e, "Signature check failed, dropping");
            return;
        }
        self.seen.insert(digest);

        match packet.recipient_id {
            Some(recipient) if recipient == self.peer_id() => {
                self.handle_addressed(kind, &packet);
            }
            Some(_) => {
                // Someone else's packet: pass it on, nothing to do locally
                self.relay(from, &packet);
            }
            None => {
                self.handle_broadcast(kind, &packet, received_ms);
                self.relay(from, &packet);
            }
        }
    }

    /// Check the packet signature.
    ///
    /// Once a sender's signing key is pinned, everything it sends must be
    /// signed by that key, announces included. An announce from a sender
    /// without a pinned key must be signed by the key it carries. Other
    /// packets from senders we have not heard announce are accepted
    /// unverified.
    fn verify_packet(&self, kind: PacketType, packet: &Packet) -> Result<(), NodeError> {
        let key = match self.signing_keys.get(&packet.sender_id) {
            Some(pinned) => *pinned,
            None if kind == PacketType::Announce => {
                match AnnouncementPacket::decode(&packet.payload) {
                    Ok(announce) => announce.signing_public_key,
                    // Left for the announce handler to report
                    Err(_) => return Ok(()),
                }
            }
            None => return Ok(()),
        };

        let signature = packet
            .signature
            .as_ref()
            .ok_or(NodeError::Unsigned(packet.sender_id))?;
        verify_with_key(&key, &packet.signing_bytes()?, signature)?;
        Ok(())
    }

    fn handle_addressed(&mut self, kind: PacketType, packet: &Packet) {
        match kind {
            PacketType::NoiseHandshake => self.handle_handshake(packet),
            PacketType::NoiseEncrypted => self.handle_encrypted(packet),
            other => {
                debug!(sender = %packet.sender_id, packet_type = %other, "Unexpected addressed packet, dropping");
            }
        }
    }

    fn handle_broadcast(&mut self, kind: PacketType, packet: &Packet, received_ms: u64) {
        match kind {
            PacketType::Announce => self.handle_announce(packet, received_ms),
            PacketType::Message => self.handle_message(packet),
            PacketType::Leave => self.handle_leave(packet),
            PacketType::Fragment => {
                trace!(sender = %packet.sender_id, "Fragment ignored");
            }
            other => {
                debug!(sender = %packet.sender_id, packet_type = %other, "Unaddressed session packet, dropping");
            }
        }
    }

    fn handle_announce(&mut self, packet: &Packet, received_ms: u64) {
        let announce = match AnnouncementPacket::decode(&packet.payload) {
            Ok(announce) => announce,
            Err(e) => {
                debug!(sender = %packet.sender_id, error = %e, "Malformed announce, dropping");
                return;
            }
        };

        let identity = match PeerIdentity::new(announce.noise_public_key, announce.signing_public_key) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(sender = %packet.sender_id, error = %e, "Announce with unusable keys, dropping");
                return;
            }
        };
        if identity.peer_id() != packet.sender_id {
            warn!(
                sender = %packet.sender_id,
                derived = %identity.peer_id(),
                "Announce key does not match sender, dropping"
            );
            return;
        }

        let peer_id = packet.sender_id;
        self.signing_keys.insert(peer_id, identity.signing_public_key());
        let info = PeerInfo {
            peer_id,
            nickname: announce.nickname.clone(),
            noise_public_key: *identity.noise_public_key(),
            signing_public_key: identity.signing_public_key(),
            last_seen_ms: received_ms,
            direct: packet.ttl >= DEFAULT_TTL,
        };
        self.peers.insert(peer_id, info);

        if self.announced.insert(peer_id) {
            info!(peer = %peer_id, nickname = %announce.nickname, "Peer announced");
            self.emit(NodeEvent::PeerAnnounced {
                peer_id,
                nickname: announce.nickname,
            });
        } else {
            trace!(peer = %peer_id, "Announce refresh");
        }
    }

    fn handle_message(&mut self, packet: &Packet) {
        let content = match String::from_utf8(packet.payload.clone()) {
            Ok(content) => content,
            Err(_) => {
                debug!(sender = %packet.sender_id, "Broadcast message is not UTF-8, dropping");
                return;
            }
        };
        self.emit(NodeEvent::BroadcastMessage {
            from: packet.sender_id,
            nickname: self.nickname_of(&packet.sender_id),
            content,
            timestamp: packet.timestamp,
        });
    }

    fn handle_leave(&mut self, packet: &Packet) {
        let peer_id = packet.sender_id;
        let nickname = self
            .peers
            .remove(&peer_id)
            .map(|p| p.nickname)
            .or_else(|| String::from_utf8(packet.payload.clone()).ok());
        info!(peer = %peer_id, "Peer left");
        self.emit(NodeEvent::PeerLeft { peer_id, nickname });
    }

    /// Broadcast a plaintext chat message.
    pub(in crate::node) fn send_broadcast(&mut self, content: &str) -> Result<(), NodeError> {
        let packet = self.new_packet(PacketType::Message, None, content.as_bytes().to_vec());
        self.sign_and_broadcast(packet)
    }
}
