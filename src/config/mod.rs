//! Node configuration.
//!
//! A config tree is assembled from up to three YAML files, read in this
//! order with each later file overriding fields set by the earlier ones:
//!
//! - `/etc/anchor-mesh/anchor-mesh.yaml`
//! - `<user config dir>/anchor-mesh/anchor-mesh.yaml`
//! - `./anchor-mesh.yaml`
//!
//! Missing files are skipped. Unknown transport keys are rejected.
//!
//! ```yaml
//! node:
//!   nickname: "relay-7"
//!   identity:
//!     peer_id: "66687aadf862bd77"
//!   announce:
//!     interval_secs: 30
//! transports:
//!   udp:
//!     bind_addr: "0.0.0.0:4000"
//! ```

mod node;
mod transport;

use crate::identity::{Identity, IdentityError, PeerId};
use crate::keystore::KeyStore;
use crate::protocol::MAX_VALUE_LEN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use node::{AnnounceConfig, BuffersConfig, NodeConfig, PendingConfig, RelayConfig};
pub use transport::{TransportsConfig, UdpConfig};

const APP_DIR: &str = "anchor-mesh";
const CONFIG_FILENAME: &str = "anchor-mesh.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("node.nickname is {len} bytes, at most {max} fit in an announce")]
    NicknameTooLong { len: usize, max: usize },
}

/// `node.identity.*`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Sender id to use instead of the one derived from the Noise static
    /// key, as 16 hex characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default, skip_serializing_if = "TransportsConfig::is_empty")]
    pub transports: TransportsConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file in [`Config::search_paths`] that exists.
    ///
    /// Also returns which files contributed.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        Self::load_from_paths(&Self::search_paths())
    }

    /// Read and merge `paths` in order, skipping ones that do not exist.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut merged = Config::default();
        let mut used = Vec::new();
        for path in paths.iter().filter(|p| p.exists()) {
            merged.merge(Self::load_file(path)?);
            used.push(path.clone());
        }
        Ok((merged, used))
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Candidate config files, lowest precedence first.
    pub fn search_paths() -> Vec<PathBuf> {
        let system = Path::new("/etc").join(APP_DIR).join(CONFIG_FILENAME);
        let user = dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME));
        let local = Path::new(".").join(CONFIG_FILENAME);
        std::iter::once(system).chain(user).chain(std::iter::once(local)).collect()
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: Config) {
        self.node.merge(other.node);
        self.transports.merge(other.transports);
    }

    pub fn configured_peer_id(&self) -> Result<Option<PeerId>, ConfigError> {
        let parsed = self
            .node
            .identity
            .peer_id
            .as_deref()
            .map(str::parse::<PeerId>)
            .transpose()?;
        Ok(parsed)
    }

    /// `node.key_dir`, else `<user data dir>/anchor-mesh/keys`.
    pub fn key_dir(&self) -> PathBuf {
        match &self.node.key_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("keys"),
        }
    }

    /// Load or create the node identity from `store`.
    ///
    /// Without a configured nickname the node calls itself `anchor-<id>`.
    pub fn create_identity(&self, store: &dyn KeyStore) -> Result<Identity, ConfigError> {
        if let Some(nickname) = &self.node.nickname
            && nickname.len() > MAX_VALUE_LEN
        {
            return Err(ConfigError::NicknameTooLong {
                len: nickname.len(),
                max: MAX_VALUE_LEN,
            });
        }
        let configured = self.configured_peer_id()?;
        let nickname = self.node.nickname.clone().unwrap_or_default();
        let mut identity = Identity::load_or_generate(store, nickname, configured)?;
        if self.node.nickname.is_none() {
            let nickname = format!("anchor-{}", identity.peer_id().short());
            identity.set_nickname(nickname);
        }
        Ok(identity)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
