//! Node configuration subsections.
//!
//! All the `node.*` configuration parameters: identity, announce timing,
//! relaying, the pending direct-message queue, and internal buffers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::IdentityConfig;
use crate::packet::DEFAULT_TTL;

// ============================================================================
// Node Configuration Subsections
// ============================================================================

/// Announce timing (`node.announce.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Delay before the first announce in ms (`node.announce.initial_delay_ms`).
    #[serde(default = "AnnounceConfig::default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Period between announces in seconds (`node.announce.interval_secs`).
    #[serde(default = "AnnounceConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Delay before the extra announce after a subscriber attaches, in ms
    /// (`node.announce.subscribe_delay_ms`).
    #[serde(default = "AnnounceConfig::default_subscribe_delay_ms")]
    pub subscribe_delay_ms: u64,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            interval_secs: 30,
            subscribe_delay_ms: 500,
        }
    }
}

impl AnnounceConfig {
    fn default_initial_delay_ms() -> u64 { 2000 }
    fn default_interval_secs() -> u64 { 30 }
    fn default_subscribe_delay_ms() -> u64 { 500 }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Announce period. Clamped to at least one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn subscribe_delay(&self) -> Duration {
        Duration::from_millis(self.subscribe_delay_ms)
    }
}

/// Relay behavior (`node.relay.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Forward packets for other peers (`node.relay.enabled`).
    #[serde(default = "RelayConfig::default_enabled")]
    pub enabled: bool,
    /// Remembered packet digests for duplicate suppression
    /// (`node.relay.seen_cache_size`).
    #[serde(default = "RelayConfig::default_seen_cache_size")]
    pub seen_cache_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seen_cache_size: 1024,
        }
    }
}

impl RelayConfig {
    fn default_enabled() -> bool { true }
    fn default_seen_cache_size() -> usize { 1024 }
}

/// Pending direct-message queue bounds (`node.pending.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Max destinations with queued messages (`node.pending.max_peers`).
    #[serde(default = "PendingConfig::default_max_peers")]
    pub max_peers: usize,
    /// Max queued messages per destination (`node.pending.per_peer`).
    #[serde(default = "PendingConfig::default_per_peer")]
    pub per_peer: usize,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            max_peers: 64,
            per_peer: 100,
        }
    }
}

impl PendingConfig {
    fn default_max_peers() -> usize { 64 }
    fn default_per_peer() -> usize { 100 }
}

/// Internal buffers (`node.buffers.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuffersConfig {
    /// Transport event channel capacity (`node.buffers.event_channel`).
    #[serde(default = "BuffersConfig::default_event_channel")]
    pub event_channel: usize,
    /// Command channel capacity (`node.buffers.command_channel`).
    #[serde(default = "BuffersConfig::default_command_channel")]
    pub command_channel: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            event_channel: 1024,
            command_channel: 64,
        }
    }
}

impl BuffersConfig {
    fn default_event_channel() -> usize { 1024 }
    fn default_command_channel() -> usize { 64 }
}

// ============================================================================
// Node Configuration (Root)
// ============================================================================

/// Node configuration (`node.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Advertised nickname (`node.nickname`). Defaults to `anchor-<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Identity configuration (`node.identity.*`).
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Directory holding key files (`node.key_dir`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_dir: Option<PathBuf>,

    /// Hop budget for locally originated packets (`node.default_ttl`).
    #[serde(default = "NodeConfig::default_ttl")]
    pub default_ttl: u8,

    /// Pad outgoing frames to standard block sizes (`node.pad_frames`).
    #[serde(default = "NodeConfig::default_pad_frames")]
    pub pad_frames: bool,

    /// Announce timing (`node.announce.*`).
    #[serde(default)]
    pub announce: AnnounceConfig,

    /// Relay behavior (`node.relay.*`).
    #[serde(default)]
    pub relay: RelayConfig,

    /// Pending queue bounds (`node.pending.*`).
    #[serde(default)]
    pub pending: PendingConfig,

    /// Internal buffers (`node.buffers.*`).
    #[serde(default)]
    pub buffers: BuffersConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            identity: IdentityConfig::default(),
            key_dir: None,
            default_ttl: DEFAULT_TTL,
            pad_frames: true,
            announce: AnnounceConfig::default(),
            relay: RelayConfig::default(),
            pending: PendingConfig::default(),
            buffers: BuffersConfig::default(),
        }
    }
}

impl NodeConfig {
    fn default_ttl() -> u8 { DEFAULT_TTL }
    fn default_pad_frames() -> bool { true }

    /// Overlay settings from `other` that differ from the defaults.
    pub fn merge(&mut self, other: NodeConfig) {
        let defaults = NodeConfig::default();
        if other.nickname.is_some() {
            self.nickname = other.nickname;
        }
        if other.identity.peer_id.is_some() {
            self.identity.peer_id = other.identity.peer_id;
        }
        if other.key_dir.is_some() {
            self.key_dir = other.key_dir;
        }
        if other.default_ttl != defaults.default_ttl {
            self.default_ttl = other.default_ttl;
        }
        if other.pad_frames != defaults.pad_frames {
            self.pad_frames = other.pad_frames;
        }
        if other.announce != defaults.announce {
            self.announce = other.announce;
        }
        if other.relay != defaults.relay {
            self.relay = other.relay;
        }
        if other.pending != defaults.pending {
            self.pending = other.pending;
        }
        if other.buffers != defaults.buffers {
            self.buffers = other.buffers;
        }
    }
}
