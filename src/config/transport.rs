//! Transport configuration types.

use serde::{Deserialize, Serialize};

/// Default UDP bind address.
const DEFAULT_UDP_BIND_ADDR: &str = "0.0.0.0:4000";

/// Default UDP broadcast destination.
const DEFAULT_UDP_BROADCAST_ADDR: &str = "255.255.255.255:4000";

/// Default UDP MTU. Large enough for the biggest padding block.
const DEFAULT_UDP_MTU: u16 = 2048;

/// UDP transport configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UdpConfig {
    /// Bind address (`bind_addr`). Defaults to "0.0.0.0:4000".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,

    /// Where broadcasts go (`broadcast_addr`). Defaults to
    /// "255.255.255.255:4000".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_addr: Option<String>,

    /// UDP MTU (`mtu`). Defaults to 2048.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
}

impl UdpConfig {
    /// Get the bind address, using default if not configured.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_UDP_BIND_ADDR)
    }

    /// Get the broadcast address, using default if not configured.
    pub fn broadcast_addr(&self) -> &str {
        self.broadcast_addr
            .as_deref()
            .unwrap_or(DEFAULT_UDP_BROADCAST_ADDR)
    }

    /// Get the UDP MTU, using default if not configured.
    pub fn mtu(&self) -> u16 {
        self.mtu.unwrap_or(DEFAULT_UDP_MTU)
    }

    /// Overlay explicitly set fields from `other`.
    pub fn merge(&mut self, other: UdpConfig) {
        if other.bind_addr.is_some() {
            self.bind_addr = other.bind_addr;
        }
        if other.broadcast_addr.is_some() {
            self.broadcast_addr = other.broadcast_addr;
        }
        if other.mtu.is_some() {
            self.mtu = other.mtu;
        }
    }
}

/// Transports section (`transports.*`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportsConfig {
    /// UDP broadcast transport (`transports.udp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<UdpConfig>,
}

impl TransportsConfig {
    /// Check if any transports are configured.
    pub fn is_empty(&self) -> bool {
        self.udp.is_none()
    }

    pub fn merge(&mut self, other: TransportsConfig) {
        match (&mut self.udp, other.udp) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (mine @ None, Some(theirs)) => *mine = Some(theirs),
            (_, None) => {}
        }
    }
}
