//! Pending direct messages.
//!
//! Messages sent to a peer before its session is established wait here,
//! per destination and in arrival order, until the handshake completes.

use super::NodeError;
use crate::identity::PeerId;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// A direct message waiting for its session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    pub message_id: String,
    pub content: String,
}

impl PendingMessage {
    pub fn new(message_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: content.into(),
        }
    }
}

/// Bounded per-destination FIFO queues.
///
/// Each destination holds at most `per_peer` messages; the oldest is
/// dropped to make room. At most `max_peers` destinations may have
/// messages waiting at once.
#[derive(Debug)]
pub struct PendingQueue {
    queues: HashMap<PeerId, VecDeque<PendingMessage>>,
    max_peers: usize,
    per_peer: usize,
}

impl PendingQueue {
    pub fn new(max_peers: usize, per_peer: usize) -> Self {
        Self {
            queues: HashMap::new(),
            max_peers: max_peers.max(1),
            per_peer: per_peer.max(1),
        }
    }

    /// Append `message` to `peer`'s queue.
    ///
    /// Returns the message dropped to make room, if any.
    pub fn enqueue(
        &mut self,
        peer: PeerId,
        message: PendingMessage,
    ) -> Result<Option<PendingMessage>, NodeError> {
        if !self.queues.contains_key(&peer) && self.queues.len() >= self.max_peers {
            return Err(NodeError::PendingQueueFull {
                max: self.max_peers,
            });
        }

        let queue = self.queues.entry(peer).or_default();
        let dropped = if queue.len() >= self.per_peer {
            queue.pop_front()
        } else {
            None
        };
        if let Some(old) = &dropped {
            warn!(peer = %peer, message_id = %old.message_id, "Pending queue full, dropping oldest message");
        }
        queue.push_back(message);
        Ok(dropped)
    }

    /// Remove and return everything queued for `peer`, oldest first.
    pub fn take(&mut self, peer: &PeerId) -> Vec<PendingMessage> {
        self.queues
            .remove(peer)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Messages waiting for `peer`.
    pub fn len(&self, peer: &PeerId) -> usize {
        self.queues.get(peer).map_or(0, VecDeque::len)
    }

    /// Number of destinations with messages waiting.
    pub fn destinations(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
