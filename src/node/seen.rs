//! Duplicate suppression for flooded packets.

use crate::packet::{Packet, PacketError};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};

type PacketDigest = [u8; 32];

/// Bounded set of recently seen packet digests.
///
/// Digests cover the packet's signing bytes, so copies of one packet that
/// differ only in TTL count as the same packet. Oldest entries are
/// forgotten first.
#[derive(Debug)]
pub struct SeenCache {
    capacity: usize,
    order: VecDeque<PacketDigest>,
    set: HashSet<PacketDigest>,
}

impl SeenCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            set: HashSet::with_capacity(capacity),
        }
    }

    /// Digest identifying `packet` across relay hops.
    pub fn digest(packet: &Packet) -> Result<PacketDigest, PacketError> {
        let bytes = packet.signing_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }

    pub fn contains(&self, digest: &PacketDigest) -> bool {
        self.set.contains(digest)
    }

    /// Record `digest`. Returns false if it was already present.
    pub fn insert(&mut self, digest: PacketDigest) -> bool {
        if !self.set.insert(digest) {
            return false;
        }
        self.order.push_back(digest);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.set.remove(&oldest);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
