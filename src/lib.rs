//! Anchor Mesh: peer-to-peer mesh messaging bridge
//!
//! A binary packet codec with a signing convention, PeerIds derived from
//! Noise static keys, a Noise XX session manager that turns a lossy
//! broadcast medium into pairwise encrypted channels, and a flood relay
//! engine that queues direct messages until their session is ready.

pub mod config;
pub mod identity;
pub mod keystore;
pub mod node;
pub mod noise;
pub mod packet;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export identity types
pub use identity::{Identity, IdentityError, PeerId, PeerIdentity};

// Re-export config types
pub use config::{Config, ConfigError, IdentityConfig, NodeConfig, UdpConfig};

// Re-export key storage
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore};

// Re-export packet types
pub use packet::{Packet, PacketError, PacketType};

// Re-export protocol types
pub use protocol::{AnnouncementPacket, EncryptedPayload, PrivateMessage, ProtocolError};

// Re-export session types
pub use session::{SessionError, SessionEvent, SessionManager, SessionState};

// Re-export transport types
pub use transport::{
    event_channel, EndpointId, EventRx, EventTx, MemoryHub, MemoryTransport, Transport,
    TransportError, TransportEvent, TransportState, UdpTransport,
};

// Re-export node types
pub use node::{Node, NodeError, NodeEvent, NodeEvents, NodeHandle, PeerInfo};
