//! Per-Peer Noise Session Manager
//!
//! Owns one session per remote PeerId and drives it through the XX
//! handshake:
//!
//! ```text
//!   None ──initiate──▶ Initiated ──msg2──▶ Established
//!   None ──msg1──────▶ Responded ──msg3──▶ Established
//! ```
//!
//! Sessions are created lazily and only ever leave the table when a
//! handshake step fails. Established is terminal: a fresh message 1 for
//! an established peer is ignored.
//!
//! Reaching Established queues a [`SessionEvent`], drained by the caller
//! with [`SessionManager::take_events`].

mod entry;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use x25519_dalek::StaticSecret;

use crate::identity::PeerId;
use crate::noise::{HandshakeRole, HandshakeState, NoiseError, HANDSHAKE_MSG1_SIZE};

use entry::PeerSession;

/// Externally visible session state for a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    None,
    /// We sent message 1.
    Initiated,
    /// We received message 1 and sent message 2.
    Responded,
    Established,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::None => "none",
            SessionState::Initiated => "initiated",
            SessionState::Responded => "responded",
            SessionState::Established => "established",
        };
        write!(f, "{}", s)
    }
}

/// Notifications produced by session transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Established(PeerId),
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No established session; the caller should queue and initiate.
    #[error("handshake required with {0}")]
    HandshakeRequired(PeerId),

    #[error("no established session with {0}")]
    SessionNotEstablished(PeerId),

    #[error("remote static key derives to {derived}, expected {expected}")]
    IdentityMismatch { expected: PeerId, derived: PeerId },

    #[error("unexpected {len}-byte handshake message from {peer} in state {state}")]
    UnexpectedMessage {
        peer: PeerId,
        state: SessionState,
        len: usize,
    },

    #[error("noise error: {0}")]
    Noise(#[from] NoiseError),
}

/// Table of per-peer sessions.
pub struct SessionManager {
    local_peer_id: PeerId,
    static_secret: StaticSecret,
    sessions: HashMap<PeerId, PeerSession>,
    events: VecDeque<SessionEvent>,
}

impl SessionManager {
    /// Create a manager for the local node.
    ///
    /// `local_peer_id` breaks ties when both sides initiate at once.
    pub fn new(local_peer_id: PeerId, static_secret: StaticSecret) -> Self {
        Self {
            local_peer_id,
            static_secret,
            sessions: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    /// Start a handshake with `peer`.
    ///
    /// Returns message 1, or `None` if a session already exists in any
    /// state.
    pub fn initiate_handshake(&mut self, peer: PeerId) -> Result<Option<Vec<u8>>, SessionError> {
        if self.sessions.contains_key(&peer) {
            debug!(peer = %peer, state = %self.state(&peer), "Handshake already in progress or done");
            return Ok(None);
        }

        let mut handshake = HandshakeState::new_initiator(self.static_secret.clone());
        let msg1 = handshake.write_message_1()?;
        self.sessions.insert(peer, PeerSession::Initiated(handshake));
        debug!(peer = %peer, "Initiated handshake");
        Ok(Some(msg1))
    }

    /// Feed a handshake message from `from`.
    ///
    /// Returns the reply to send back, if any. On error the peer's session
    /// is discarded so that a later send can start over.
    pub fn process_handshake_message(
        &mut self,
        from: PeerId,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>, SessionError> {
        let Some(existing) = self.sessions.remove(&from) else {
            return self.respond(from, message);
        };

        match existing {
            PeerSession::Initiated(handshake) => {
                if message.len() == HANDSHAKE_MSG1_SIZE {
                    return self.resolve_simultaneous(from, handshake, message);
                }
                self.complete_as_initiator(from, handshake, message)
            }
            PeerSession::Responded(handshake) => {
                if message.len() == HANDSHAKE_MSG1_SIZE {
                    debug!(peer = %from, "Peer restarted handshake, responding afresh");
                    return self.respond(from, message);
                }
                self.complete_as_responder(from, handshake, message)?;
                Ok(None)
            }
            PeerSession::Established(session) => {
                debug!(
                    peer = %from,
                    len = message.len(),
                    "Ignoring handshake message for established session"
                );
                self.sessions.insert(from, PeerSession::Established(session));
                Ok(None)
            }
        }
    }

    /// Encrypt a transport message for `peer`.
    pub fn encrypt(&mut self, plaintext: &[u8], peer: &PeerId) -> Result<Vec<u8>, SessionError> {
        match self.sessions.get_mut(peer) {
            Some(PeerSession::Established(session)) => Ok(session.encrypt(plaintext)?),
            _ => Err(SessionError::HandshakeRequired(*peer)),
        }
    }

    /// Decrypt a transport message from `peer`.
    pub fn decrypt(&mut self, ciphertext: &[u8], peer: &PeerId) -> Result<Vec<u8>, SessionError> {
        match self.sessions.get_mut(peer) {
            Some(PeerSession::Established(session)) => Ok(session.decrypt(ciphertext)?),
            _ => Err(SessionError::SessionNotEstablished(*peer)),
        }
    }

    pub fn has_established_session(&self, peer: &PeerId) -> bool {
        self.state(peer) == SessionState::Established
    }

    pub fn state(&self, peer: &PeerId) -> SessionState {
        self.sessions
            .get(peer)
            .map(PeerSession::state)
            .unwrap_or(SessionState::None)
    }

    /// The peer's static key, once the handshake revealed it.
    pub fn remote_static(&self, peer: &PeerId) -> Option<[u8; 32]> {
        match self.sessions.get(peer)? {
            PeerSession::Established(session) => Some(*session.remote_static()),
            _ => None,
        }
    }

    /// Discard an unfinished handshake with `peer`, e.g. when its message
    /// never made it onto the wire. Established sessions are kept.
    ///
    /// Returns true if a handshake was discarded.
    pub fn abandon(&mut self, peer: &PeerId) -> bool {
        match self.sessions.get(peer) {
            Some(PeerSession::Established(_)) | None => false,
            Some(_) => {
                self.sessions.remove(peer);
                debug!(peer = %peer, "Handshake abandoned");
                true
            }
        }
    }

    /// Drain queued session events.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Number of sessions in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Peers with an established session.
    pub fn established_peers(&self) -> Vec<PeerId> {
        self.sessions
            .iter()
            .filter(|(_, s)| matches!(s, PeerSession::Established(_)))
            .map(|(peer, _)| *peer)
            .collect()
    }

    // === Transitions ===

    /// None → Responded: read message 1, return message 2.
    fn respond(&mut self, from: PeerId, message: &[u8]) -> Result<Option<Vec<u8>>, SessionError> {
        if message.len() != HANDSHAKE_MSG1_SIZE {
            return Err(SessionError::UnexpectedMessage {
                peer: from,
                state: SessionState::None,
                len: message.len(),
            });
        }
        let mut handshake = HandshakeState::new_responder(self.static_secret.clone());
        handshake.read_message_1(message)?;
        let msg2 = handshake.write_message_2()?;
        self.sessions.insert(from, PeerSession::Responded(handshake));
        debug!(peer = %from, "Responded to handshake");
        Ok(Some(msg2))
    }

    /// Both sides sent message 1. The smaller PeerId stays initiator.
    fn resolve_simultaneous(
        &mut self,
        from: PeerId,
        handshake: HandshakeState,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>, SessionError> {
        if self.local_peer_id < from {
            debug!(peer = %from, "Simultaneous initiation, keeping initiator role");
            self.sessions.insert(from, PeerSession::Initiated(handshake));
            return Ok(None);
        }
        debug!(peer = %from, "Simultaneous initiation, yielding to peer");
        drop(handshake);
        self.respond(from, message)
    }

    /// Initiated → Established: read message 2, return message 3.
    fn complete_as_initiator(
        &mut self,
        from: PeerId,
        mut handshake: HandshakeState,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>, SessionError> {
        debug_assert_eq!(handshake.role(), HandshakeRole::Initiator);
        handshake.read_message_2(message)?;
        let msg3 = handshake.write_message_3()?;
        self.establish(from, handshake)?;
        Ok(Some(msg3))
    }

    /// Responded → Established: read message 3.
    fn complete_as_responder(
        &mut self,
        from: PeerId,
        mut handshake: HandshakeState,
        message: &[u8],
    ) -> Result<(), SessionError> {
        handshake.read_message_3(message)?;
        self.establish(from, handshake)
    }

    /// Bind the learned static key to `from` and install the session.
    fn establish(&mut self, from: PeerId, handshake: HandshakeState) -> Result<(), SessionError> {
        let session = handshake.into_session()?;
        let derived = PeerId::derive(session.remote_static());
        if derived != from {
            warn!(
                peer = %from,
                derived = %derived,
                "Handshake static key does not match sender id, discarding session"
            );
            return Err(SessionError::IdentityMismatch {
                expected: from,
                derived,
            });
        }

        info!(peer = %from, role = %session.role(), "Session established");
        self.sessions.insert(from, PeerSession::Established(session));
        self.events.push_back(SessionEvent::Established(from));
        Ok(())
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("local_peer_id", &self.local_peer_id)
            .field("sessions", &self.sessions.len())
            .field("pending_events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
