//! Building, signing and sending locally originated packets.

use super::{Node, NodeError};
use crate::identity::PeerId;
use crate::packet::{Packet, PacketType};
use crate::transport::now_ms;
use tracing::{error, trace};

impl Node {
    /// A fresh packet from us with the configured hop budget.
    pub(in crate::node) fn new_packet(
        &self,
        packet_type: PacketType,
        recipient: Option<PeerId>,
        payload: Vec<u8>,
    ) -> Packet {
        Packet::new(
            packet_type,
            self.identity.peer_id(),
            recipient,
            now_ms(),
            payload,
            self.config.default_ttl,
        )
    }

    /// Sign `packet` and broadcast it to every neighbor.
    ///
    /// A signing failure aborts the send.
    pub(in crate::node) fn sign_and_broadcast(&mut self, mut packet: Packet) -> Result<(), NodeError> {
        let signing_bytes = packet.signing_bytes()?;
        let signature = match self.identity.sign(&signing_bytes) {
            Ok(signature) => signature,
            Err(e) => {
                error!(packet_type = packet.packet_type, error = %e, "Signing failed, send aborted");
                return Err(e.into());
            }
        };
        packet.signature = Some(signature);

        let frame = packet.encode(self.config.pad_frames)?;
        self.transport.broadcast(&frame)?;
        trace!(
            packet_type = packet.packet_type,
            recipient = ?packet.recipient_id,
            bytes = frame.len(),
            "Packet sent"
        );
        Ok(())
    }
}
