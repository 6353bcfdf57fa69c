//! Ring-wide configuration shared by every node of a ring.

use crate::error::{Error, Result};
use crate::space::IdentifierSpace;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings that must agree across all nodes of one ring (`bits`) plus the
/// per-node protocol bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Identifier width m; the ring holds `2^m` identifiers.
    pub bits: u8,
    /// Bound on every outbound RPC, connect included.
    pub rpc_timeout_ms: u64,
    /// Lookups give up after `bits * hop_factor` hops.
    pub hop_factor: usize,
    /// Bound on the backward propagation of one finger correction.
    pub max_update_forwards: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            bits: 32,
            rpc_timeout_ms: 2_000,
            hop_factor: 4,
            max_update_forwards: 1_024,
        }
    }
}

impl RingConfig {
    pub fn with_bits(bits: u8) -> Self {
        Self {
            bits,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        IdentifierSpace::new(self.bits)?;
        if self.rpc_timeout_ms == 0 {
            return Err(Error::Misconfigured("rpc timeout must be positive".into()));
        }
        if self.hop_factor == 0 || self.max_update_forwards == 0 {
            return Err(Error::Misconfigured("routing bounds must be positive".into()));
        }
        Ok(())
    }

    pub fn space(&self) -> Result<IdentifierSpace> {
        IdentifierSpace::new(self.bits)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Maximum number of routing hops for one successor search.
    pub fn hop_limit(&self) -> usize {
        self.bits as usize * self.hop_factor
    }
}
