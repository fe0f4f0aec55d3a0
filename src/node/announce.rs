//! Presence announces.
//!
//! The node announces itself `initial_delay` after start, then every
//! `interval`, plus once more `subscribe_delay` after each new subscriber
//! attaches so newcomers learn about us quickly.

use super::{Node, NodeError};
use crate::identity::{validate_identity, PeerId};
use crate::packet::{PacketType, DEFAULT_TTL};
use crate::protocol::{AnnouncementPacket, MAX_NEIGHBORS};
use tokio::time::Instant;
use tracing::{debug, warn};

impl Node {
    /// Broadcast a signed announce carrying our keys and direct neighbors.
    pub fn send_announce(&mut self) -> Result<(), NodeError> {
        if let Some(configured) = &self.configured_peer_id
            && let Err(e) = validate_identity(configured, &self.identity.static_public_key())
        {
            warn!(error = %e, "Announcing with a PeerId peers cannot verify");
        }

        let announce = AnnouncementPacket::new(
            self.identity.nickname(),
            self.identity.static_public_key(),
            self.identity.signing_public_key(),
        )
        .with_neighbors(self.direct_neighbors());

        let mut packet = self.new_packet(PacketType::Announce, None, announce.encode()?);
        packet.ttl = DEFAULT_TTL;
        self.sign_and_broadcast(packet)?;

        debug!(
            nickname = %self.identity.nickname(),
            neighbors = announce.direct_neighbors.len(),
            "Sent announce"
        );
        Ok(())
    }

    /// Broadcast a signed leave notice carrying our nickname.
    pub fn send_leave(&mut self) -> Result<(), NodeError> {
        let payload = self.identity.nickname().as_bytes().to_vec();
        let packet = self.new_packet(PacketType::Leave, None, payload);
        self.sign_and_broadcast(packet)?;
        debug!("Sent leave");
        Ok(())
    }

    /// Peers whose latest announce reached us unrelayed, up to the
    /// announce neighbor limit.
    fn direct_neighbors(&self) -> Vec<PeerId> {
        let mut neighbors: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.direct)
            .map(|p| p.peer_id)
            .collect();
        neighbors.sort();
        neighbors.truncate(MAX_NEIGHBORS);
        neighbors
    }

    /// Schedule the extra announce that follows a subscriber attaching.
    pub(in crate::node) fn schedule_subscriber_announce(&mut self) {
        let deadline = Instant::now() + self.config.announce.subscribe_delay();
        self.announce_deadlines.push_back(deadline);
    }

    /// The earliest scheduled extra announce, if any.
    pub(in crate::node) fn next_announce_deadline(&self) -> Option<Instant> {
        self.announce_deadlines.front().copied()
    }

    /// Send every extra announce whose deadline has passed.
    ///
    /// Deadlines that fall due together collapse into one announce.
    pub(in crate::node) fn fire_due_announces(&mut self) {
        let now = Instant::now();
        let mut due = 0;
        while self.announce_deadlines.front().is_some_and(|d| *d <= now) {
            self.announce_deadlines.pop_front();
            due += 1;
        }
        if due > 0
            && let Err(e) = self.send_announce()
        {
            warn!(error = %e, "Failed to send announce");
        }
    }
}
