//! Flood relaying.

use crate::node::Node;
use crate::packet::Packet;
use crate::transport::EndpointId;
use tracing::{debug, trace};

impl Node {
    /// Forward `packet` to every reachable endpoint except its source.
    ///
    /// The TTL is decremented first; a packet whose TTL would reach zero
    /// is not forwarded.
    pub(in crate::node) fn relay(&mut self, from: Option<EndpointId>, packet: &Packet) {
        if !self.config.relay.enabled {
            return;
        }

        let ttl = packet.ttl.saturating_sub(1);
        if ttl == 0 {
            trace!(sender = %packet.sender_id, "TTL exhausted, not relaying");
            return;
        }

        let mut forwarded = packet.clone();
        forwarded.ttl = ttl;
        let frame = match forwarded.encode(self.config.pad_frames) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(sender = %packet.sender_id, error = %e, "Cannot re-encode for relay");
                return;
            }
        };

        let mut sent = 0;
        for &endpoint in &self.endpoints {
            if Some(endpoint) == from {
                continue;
            }
            match self.transport.send_to(endpoint, &frame) {
                Ok(()) => sent += 1,
                Err(e) => debug!(endpoint = %endpoint, error = %e, "Relay send failed"),
            }
        }
        trace!(sender = %packet.sender_id, ttl, endpoints = sent, "Relayed packet");
    }
}
