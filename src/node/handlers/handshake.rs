//! Noise handshake packets and session establishment.

use crate::identity::PeerId;
use crate::node::{Node, NodeError, NodeEvent};
use crate::packet::{Packet, PacketType};
use crate::session::SessionEvent;
use tracing::{debug, info, warn};

impl Node {
    /// Handle a handshake message addressed to us.
    pub(in crate::node) fn handle_handshake(&mut self, packet: &Packet) {
        let from = packet.sender_id;
        match self.sessions.process_handshake_message(from, &packet.payload) {
            Ok(Some(reply)) => {
                if let Err(e) = self.send_handshake(from, reply) {
                    warn!(peer = %from, error = %e, "Failed to send handshake reply");
                    self.sessions.abandon(&from);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(peer = %from, error = %e, "Handshake failed, session discarded");
            }
        }
        self.process_session_events();
    }

    /// Start a handshake with `peer` unless one exists.
    ///
    /// If message 1 cannot be sent the handshake is abandoned, so the next
    /// attempt starts over instead of waiting on a reply that cannot come.
    pub(in crate::node) fn initiate_handshake(&mut self, peer: PeerId) -> Result<(), NodeError> {
        let Some(msg1) = self.sessions.initiate_handshake(peer)? else {
            return Ok(());
        };
        debug!(peer = %peer, "Sending handshake initiation");
        if let Err(e) = self.send_handshake(peer, msg1) {
            self.sessions.abandon(&peer);
            return Err(e);
        }
        Ok(())
    }

    fn send_handshake(&mut self, peer: PeerId, message: Vec<u8>) -> Result<(), NodeError> {
        let packet = self.new_packet(PacketType::NoiseHandshake, Some(peer), message);
        self.sign_and_broadcast(packet)
    }

    /// Drain session events: report new sessions and flush their queues.
    pub(in crate::node) fn process_session_events(&mut self) {
        for event in self.sessions.take_events() {
            match event {
                SessionEvent::Established(peer) => {
                    info!(peer = %peer, "Session established");
                    self.emit(NodeEvent::SessionEstablished(peer));
                    self.flush_pending(peer);
                }
            }
        }
    }
}
