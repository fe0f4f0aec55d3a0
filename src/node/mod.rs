//! Mesh Node
//!
//! The dispatch and relay engine. A [`Node`] owns the local identity, the
//! session manager, the peer directory and the pending direct-message
//! queue, and runs as a single task that selects over transport events,
//! application commands and the announce timers.
//!
//! Applications talk to a running node through a [`NodeHandle`] and
//! receive [`NodeEvent`]s on an unbounded channel.

mod announce;
mod handlers;
mod outbound;
mod pending;
mod seen;

pub use pending::{PendingMessage, PendingQueue};
pub use seen::SeenCache;

use crate::config::NodeConfig;
use crate::identity::{Identity, IdentityError, PeerId, PUBLIC_KEY_SIZE};
use crate::packet::PacketError;
use crate::protocol::ProtocolError;
use crate::session::{SessionError, SessionManager};
use crate::transport::{EndpointId, EventRx, Transport, TransportError};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Errors related to node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node stopped")]
    Stopped,

    #[error("pending queue full: {max} destinations already waiting")]
    PendingQueueFull { max: usize },

    #[error("cannot send a direct message to ourselves")]
    SelfAddressed,

    #[error("packet from {0} is missing a required signature")]
    Unsigned(PeerId),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("payload error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// A peer known from its announces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub nickname: String,
    pub noise_public_key: [u8; PUBLIC_KEY_SIZE],
    pub signing_public_key: [u8; PUBLIC_KEY_SIZE],
    /// Local receive time of the latest announce, ms since the Unix epoch.
    pub last_seen_ms: u64,
    /// The latest announce arrived without having been relayed.
    pub direct: bool,
}

/// Something the application should know about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// First announce heard from a peer.
    PeerAnnounced { peer_id: PeerId, nickname: String },
    /// Plaintext broadcast chat message.
    BroadcastMessage {
        from: PeerId,
        nickname: Option<String>,
        content: String,
        timestamp: u64,
    },
    /// Decrypted private message addressed to us.
    DirectMessage {
        from: PeerId,
        nickname: Option<String>,
        message_id: String,
        content: String,
        timestamp: u64,
    },
    /// A peer announced its departure.
    PeerLeft {
        peer_id: PeerId,
        nickname: Option<String>,
    },
    /// A Noise session with the peer is ready.
    SessionEstablished(PeerId),
}

/// Receiver for node events.
pub type NodeEvents = mpsc::UnboundedReceiver<NodeEvent>;

/// Requests from a [`NodeHandle`] to the node task.
#[derive(Debug)]
pub(crate) enum NodeCommand {
    Broadcast {
        content: String,
        reply: oneshot::Sender<Result<(), NodeError>>,
    },
    SendDirect {
        to: PeerId,
        content: String,
        reply: oneshot::Sender<Result<String, NodeError>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerInfo>>,
    },
    Shutdown,
}

/// Cloneable control handle for a running node.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    peer_id: PeerId,
    tx: mpsc::Sender<NodeCommand>,
}

impl NodeHandle {
    /// The node's own PeerId.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Broadcast a plaintext chat message to the whole mesh.
    pub async fn broadcast(&self, content: impl Into<String>) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::Broadcast {
            content: content.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NodeError::Stopped)?
    }

    /// Send an encrypted direct message, returning its message id.
    ///
    /// Without an established session the message is queued and a
    /// handshake is started; it goes out once the session is ready.
    pub async fn send_direct(
        &self,
        to: PeerId,
        content: impl Into<String>,
    ) -> Result<String, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::SendDirect {
            to,
            content: content.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NodeError::Stopped)?
    }

    /// Snapshot of the peer directory, sorted by PeerId.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::Peers { reply }).await?;
        rx.await.map_err(|_| NodeError::Stopped)
    }

    /// Broadcast a leave notice and stop the node task.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.request(NodeCommand::Shutdown).await
    }

    async fn request(&self, command: NodeCommand) -> Result<(), NodeError> {
        self.tx.send(command).await.map_err(|_| NodeError::Stopped)
    }
}

/// A mesh node.
///
/// ## Receive Pipeline
///
/// decode, drop our own echoes, drop duplicates, verify the signature,
/// handle by packet type, relay. Packets addressed to another peer are
/// only relayed; packets addressed to us are never relayed.
pub struct Node {
    // === Identity ===
    identity: Identity,
    /// PeerId from configuration, checked before each announce.
    configured_peer_id: Option<PeerId>,

    // === Configuration ===
    config: NodeConfig,

    // === Transport ===
    transport: Box<dyn Transport>,
    transport_rx: EventRx,
    /// Endpoints currently reachable through the transport.
    endpoints: BTreeSet<EndpointId>,

    // === Application Channels ===
    command_rx: mpsc::Receiver<NodeCommand>,
    event_tx: mpsc::UnboundedSender<NodeEvent>,

    // === Sessions ===
    sessions: SessionManager,
    pending: PendingQueue,

    // === Peers ===
    /// Peer directory, updated by every accepted announce.
    peers: HashMap<PeerId, PeerInfo>,
    /// Peers that already produced a `PeerAnnounced` event.
    announced: HashSet<PeerId>,
    /// Signing key per peer, pinned by its first verified announce. Outlives
    /// the directory entry so a Leave cannot reopen the peer to forgery.
    signing_keys: HashMap<PeerId, [u8; PUBLIC_KEY_SIZE]>,

    // === Relay ===
    seen: SeenCache,

    // === Timers ===
    /// Extra announces scheduled after subscribers attach, earliest first.
    announce_deadlines: VecDeque<Instant>,
}

impl Node {
    /// Create a node over `transport`, whose events arrive on `transport_rx`.
    ///
    /// Returns the node (to be driven with [`Node::run`]), a handle for
    /// commands, and the application event receiver.
    pub fn new(
        identity: Identity,
        config: NodeConfig,
        transport: Box<dyn Transport>,
        transport_rx: EventRx,
    ) -> (Self, NodeHandle, NodeEvents) {
        let (command_tx, command_rx) = mpsc::channel(config.buffers.command_channel.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let peer_id = identity.peer_id();
        let configured_peer_id = (peer_id != identity.derived_peer_id()).then_some(peer_id);
        let sessions = SessionManager::new(peer_id, identity.static_secret().clone());
        let pending = PendingQueue::new(config.pending.max_peers, config.pending.per_peer);
        let seen = SeenCache::new(config.relay.seen_cache_size);

        let node = Self {
            identity,
            configured_peer_id,
            config,
            transport,
            transport_rx,
            endpoints: BTreeSet::new(),
            command_rx,
            event_tx,
            sessions,
            pending,
            peers: HashMap::new(),
            announced: HashSet::new(),
            signing_keys: HashMap::new(),
            seen,
            announce_deadlines: VecDeque::new(),
        };
        let handle = NodeHandle {
            peer_id,
            tx: command_tx,
        };
        (node, handle, event_rx)
    }

    /// Our PeerId, as used for `sender_id`.
    pub fn peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Snapshot of the peer directory, sorted by PeerId.
    pub fn peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<_> = self.peers.values().cloned().collect();
        peers.sort_by_key(|p| p.peer_id);
        peers
    }

    /// Directory entry for `peer_id`.
    pub fn peer(&self, peer_id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(peer_id)
    }

    /// Number of reachable transport endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    fn emit(&self, event: NodeEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    fn nickname_of(&self, peer_id: &PeerId) -> Option<String> {
        self.peers.get(peer_id).map(|p| p.nickname.clone())
    }
}
