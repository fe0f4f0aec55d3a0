//! Transport Layer Abstractions
//!
//! Traits and types for mesh transport drivers. A transport moves opaque
//! frames between this node and its directly reachable endpoints and
//! reports what it sees as [`TransportEvent`]s on a channel.
//!
//! Sends are synchronous and fire-and-forget: the medium is lossy, so a
//! transport that cannot deliver a frame right now drops it.

pub mod memory;
pub mod udp;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use memory::{MemoryHub, MemoryTransport};
pub use udp::UdpTransport;

// ============================================================================
// Event Channel Types
// ============================================================================

/// Something a transport observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A frame arrived. `from` is the endpoint it came from, when known.
    FrameReceived {
        from: Option<EndpointId>,
        data: Vec<u8>,
        timestamp_ms: u64,
    },
    /// We connected to an endpoint.
    EndpointConnected(EndpointId),
    /// A connected endpoint went away.
    EndpointDisconnected(EndpointId),
    /// An endpoint started listening to our broadcasts.
    SubscriberAttached(EndpointId),
    /// A listening endpoint went away.
    SubscriberDetached(EndpointId),
}

impl TransportEvent {
    /// Build a `FrameReceived` stamped with the current time.
    pub fn frame(from: Option<EndpointId>, data: Vec<u8>) -> Self {
        TransportEvent::FrameReceived {
            from,
            data,
            timestamp_ms: now_ms(),
        }
    }
}

/// Channel sender for transport events.
pub type EventTx = tokio::sync::mpsc::Sender<TransportEvent>;

/// Channel receiver for transport events.
pub type EventRx = tokio::sync::mpsc::Receiver<TransportEvent>;

/// Create an event channel with the given buffer size.
pub fn event_channel(buffer: usize) -> (EventTx, EventRx) {
    tokio::sync::mpsc::channel(buffer)
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Endpoint Identifiers
// ============================================================================

/// Transport-local handle for a directly reachable endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint:{}", self.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not started")]
    NotStarted,

    #[error("transport already started")]
    AlreadyStarted,

    #[error("transport failed to start: {0}")]
    StartFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(EndpointId),

    #[error("invalid transport address: {0}")]
    InvalidAddress(String),

    #[error("mtu exceeded: packet {packet_size} > mtu {mtu}")]
    MtuExceeded { packet_size: usize, mtu: u16 },
}

// ============================================================================
// Transport State
// ============================================================================

/// Transport lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    /// Configured but not started.
    Configured,
    /// Ready for traffic.
    Up,
    /// Was up, now unavailable.
    Down,
}

impl TransportState {
    /// Check if the transport is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, TransportState::Up)
    }

    /// Check if the transport can be started.
    pub fn can_start(&self) -> bool {
        matches!(self, TransportState::Configured | TransportState::Down)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportState::Configured => "configured",
            TransportState::Up => "up",
            TransportState::Down => "down",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// A mesh transport driver.
pub trait Transport: Send {
    /// Largest frame this transport carries.
    fn mtu(&self) -> u16;

    /// Send a frame to every reachable endpoint.
    fn broadcast(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Send a frame to one endpoint.
    fn send_to(&self, endpoint: EndpointId, data: &[u8]) -> Result<(), TransportError>;
}

pub(crate) fn check_mtu(data: &[u8], mtu: u16) -> Result<(), TransportError> {
    if data.len() > mtu as usize {
        return Err(TransportError::MtuExceeded {
            packet_size: data.len(),
            mtu,
        });
    }
    Ok(())
}
