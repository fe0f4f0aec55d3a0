//! In-Process Memory Transport
//!
//! A [`MemoryHub`] simulates a radio neighborhood inside one process.
//! Each member is a [`MemoryTransport`] with its own event channel;
//! links between members are explicit, so tests can build line or star
//! topologies to exercise relaying.
//!
//! When a member joins, it sees `EndpointConnected` for each neighbor and
//! each neighbor sees `SubscriberAttached` for the newcomer. Dropping a
//! member reports `EndpointDisconnected` to its neighbors.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use super::{
    check_mtu, event_channel, EndpointId, EventRx, EventTx, Transport, TransportError,
    TransportEvent,
};

/// Default frame size limit for memory links.
pub const DEFAULT_MEMORY_MTU: u16 = 2048;

/// Per-member event channel depth. Frames beyond this are dropped.
const MEMORY_CHANNEL_CAPACITY: usize = 1024;

struct Member {
    tx: EventTx,
    links: BTreeSet<EndpointId>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    members: HashMap<EndpointId, Member>,
}

impl HubInner {
    fn deliver(&self, to: EndpointId, event: TransportEvent) {
        if let Some(member) = self.members.get(&to)
            && member.tx.try_send(event).is_err()
        {
            trace!(to = %to, "Memory member channel full or closed, dropping event");
        }
    }
}

/// Shared neighborhood that memory transports join.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join, linked to every current member.
    pub fn join(&self) -> (MemoryTransport, EventRx) {
        let neighbors = self.members();
        self.join_with(&neighbors)
    }

    /// Join, linked only to the given members.
    pub fn join_with(&self, neighbors: &[EndpointId]) -> (MemoryTransport, EventRx) {
        let (tx, rx) = event_channel(MEMORY_CHANNEL_CAPACITY);
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };

        inner.next_id += 1;
        let id = EndpointId::new(inner.next_id);
        let mut links = BTreeSet::new();

        for &neighbor in neighbors {
            let Some(member) = inner.members.get_mut(&neighbor) else {
                continue;
            };
            member.links.insert(id);
            links.insert(neighbor);
        }

        for &neighbor in &links {
            inner.deliver(neighbor, TransportEvent::SubscriberAttached(id));
            let _ = tx.try_send(TransportEvent::EndpointConnected(neighbor));
        }

        inner.members.insert(id, Member { tx, links });
        debug!(endpoint = %id, neighbors = inner.members[&id].links.len(), "Memory member joined");

        let transport = MemoryTransport {
            id,
            mtu: DEFAULT_MEMORY_MTU,
            hub: self.clone(),
        };
        (transport, rx)
    }

    /// Remove the link between two members, notifying both.
    pub fn unlink(&self, a: EndpointId, b: EndpointId) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let removed_a = inner
            .members
            .get_mut(&a)
            .is_some_and(|m| m.links.remove(&b));
        let removed_b = inner
            .members
            .get_mut(&b)
            .is_some_and(|m| m.links.remove(&a));
        if removed_a {
            inner.deliver(a, TransportEvent::EndpointDisconnected(b));
        }
        if removed_b {
            inner.deliver(b, TransportEvent::EndpointDisconnected(a));
        }
    }

    /// All current members.
    pub fn members(&self) -> Vec<EndpointId> {
        match self.inner.lock() {
            Ok(inner) => {
                let mut ids: Vec<_> = inner.members.keys().copied().collect();
                ids.sort();
                ids
            }
            Err(_) => Vec::new(),
        }
    }

    fn leave(&self, id: EndpointId) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let Some(member) = inner.members.remove(&id) else {
            return;
        };
        for neighbor in member.links {
            if let Some(m) = inner.members.get_mut(&neighbor) {
                m.links.remove(&id);
            }
            inner.deliver(neighbor, TransportEvent::EndpointDisconnected(id));
        }
        debug!(endpoint = %id, "Memory member left");
    }
}

/// One member of a [`MemoryHub`].
pub struct MemoryTransport {
    id: EndpointId,
    mtu: u16,
    hub: MemoryHub,
}

impl MemoryTransport {
    /// This member's endpoint id, as its neighbors see it.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Override the frame size limit.
    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    fn with_inner<R>(&self, f: impl FnOnce(&HubInner) -> R) -> Result<R, TransportError> {
        let inner = self
            .hub
            .inner
            .lock()
            .map_err(|_| TransportError::SendFailed("memory hub poisoned".into()))?;
        Ok(f(&inner))
    }
}

impl Transport for MemoryTransport {
    fn mtu(&self) -> u16 {
        self.mtu
    }

    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError> {
        check_mtu(data, self.mtu)?;
        let id = self.id;
        self.with_inner(|inner| {
            let Some(me) = inner.members.get(&id) else {
                return;
            };
            for &neighbor in &me.links {
                inner.deliver(neighbor, TransportEvent::frame(Some(id), data.to_vec()));
            }
        })
    }

    fn send_to(&self, endpoint: EndpointId, data: &[u8]) -> Result<(), TransportError> {
        check_mtu(data, self.mtu)?;
        let id = self.id;
        self.with_inner(|inner| {
            let linked = inner
                .members
                .get(&id)
                .is_some_and(|me| me.links.contains(&endpoint));
            if !linked {
                return Err(TransportError::UnknownEndpoint(endpoint));
            }
            inner.deliver(endpoint, TransportEvent::frame(Some(id), data.to_vec()));
            Ok(())
        })?
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.hub.leave(self.id);
    }
}
