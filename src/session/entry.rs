//! Session table entries.

use super::SessionState;
use crate::noise::{HandshakeState, NoiseSession};

/// Handshake or transport state for one peer.
pub(super) enum PeerSession {
    /// We sent message 1, awaiting message 2.
    Initiated(HandshakeState),
    /// We sent message 2, awaiting message 3.
    Responded(HandshakeState),
    /// Handshake complete, NoiseSession available for encrypt/decrypt.
    Established(NoiseSession),
}

impl PeerSession {
    pub(super) fn state(&self) -> SessionState {
        match self {
            PeerSession::Initiated(_) => SessionState::Initiated,
            PeerSession::Responded(_) => SessionState::Responded,
            PeerSession::Established(_) => SessionState::Established,
        }
    }
}
