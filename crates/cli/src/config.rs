//! Command line arguments.

use anyhow::Context;
use clap::{Parser, Subcommand};
use corelib::RingConfig;
use std::path::PathBuf;

/// Run or query a Chord ring
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// JSON file with the ring settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Identifier width in bits; must match every node of the ring
    #[arg(short, long, global = true)]
    pub bits: Option<u8>,

    /// Timeout of every RPC in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a node until interrupted
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        listen: String,

        /// Address other nodes should use to reach this one
        #[arg(short, long)]
        advertise: Option<String>,

        /// Any node of the ring to join; starts a new ring when absent
        #[arg(short, long)]
        join: Option<String>,

        /// Fixed node identifier instead of the hash of the address
        #[arg(long)]
        id: Option<u64>,
    },
    /// Store a value
    Insert {
        /// Any node of the ring
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        node: String,

        /// Treat the key as a literal identifier
        #[arg(long)]
        id: bool,

        key: String,
        value: String,
    },
    /// Fetch a value
    Lookup {
        /// Any node of the ring
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        node: String,

        /// Treat the key as a literal identifier
        #[arg(long)]
        id: bool,

        key: String,
    },
    /// Print the state of one node
    Status {
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        node: String,
    },
}

impl CliConfig {
    /// Ring settings from `--config`, overridden by individual flags.
    pub fn ring_config(&self) -> anyhow::Result<RingConfig> {
        let mut ring = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid ring config in {}", path.display()))?
            }
            None => RingConfig::default(),
        };
        if let Some(bits) = self.bits {
            ring.bits = bits;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            ring.rpc_timeout_ms = timeout_ms;
        }
        ring.validate()?;
        Ok(ring)
    }
}
