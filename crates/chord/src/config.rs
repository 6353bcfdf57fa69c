//! Per-node launch settings.

use corelib::RingConfig;
use serde::{Deserialize, Serialize};

/// Everything needed to bring one node up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the RPC listener binds to. Port 0 picks a free port.
    pub listen: String,
    /// Endpoint other nodes should use, when it differs from the bound
    /// address (e.g. behind NAT or when binding `0.0.0.0`).
    pub advertise: Option<String>,
    /// Contact node of an existing ring; `None` starts a new ring.
    pub join: Option<String>,
    /// Fixed identifier instead of the hash of the advertised endpoint.
    pub id: Option<u64>,
    #[serde(default)]
    pub ring: RingConfig,
}

impl NodeConfig {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            advertise: None,
            join: None,
            id: None,
            ring: RingConfig::default(),
        }
    }

    pub fn with_join(mut self, contact: impl Into<String>) -> Self {
        self.join = Some(contact.into());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_advertise(mut self, addr: impl Into<String>) -> Self {
        self.advertise = Some(addr.into());
        self
    }

    pub fn with_ring(mut self, ring: RingConfig) -> Self {
        self.ring = ring;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:0")
    }
}
