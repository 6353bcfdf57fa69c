//! Subcommand execution.

use crate::config::{CliConfig, Command};
use anyhow::Context;
use chord::{NodeConfig, RingClient, RingNode};
use corelib::{Identifier, Key, NodeRef, NodeStatus};
use std::fmt;
use tracing::info;

/// What a finished subcommand prints.
#[derive(Debug)]
pub enum CommandResult {
    Stopped(NodeRef),
    Stored { key: Key, owner: NodeRef },
    Value(Vec<u8>),
    Status(NodeStatus),
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Stopped(node) => write!(f, "node {} stopped", node),
            CommandResult::Stored { key, owner } => write!(f, "stored {} on {}", key, owner),
            CommandResult::Value(value) => write!(f, "{}", String::from_utf8_lossy(value)),
            CommandResult::Status(status) => {
                let json = serde_json::to_string_pretty(status).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

fn parse_key(raw: &str, literal: bool) -> anyhow::Result<Key> {
    if literal {
        let id: u64 = raw
            .parse()
            .with_context(|| format!("{:?} is not a numeric identifier", raw))?;
        Ok(Key::Id(Identifier(id)))
    } else {
        Ok(Key::from(raw))
    }
}

impl CliConfig {
    pub async fn run(self) -> anyhow::Result<CommandResult> {
        let ring = self.ring_config()?;
        match self.command {
            Command::Serve {
                listen,
                advertise,
                join,
                id,
            } => {
                let config = NodeConfig {
                    listen,
                    advertise,
                    join,
                    id,
                    ring,
                };
                let node = RingNode::launch(config).await?;
                info!(node = %node.node_ref(), "serving, press Ctrl-C to stop");
                tokio::signal::ctrl_c()
                    .await
                    .context("cannot wait for Ctrl-C")?;
                node.shutdown();
                Ok(CommandResult::Stopped(node.node_ref().clone()))
            }
            Command::Insert {
                node,
                id,
                key,
                value,
            } => {
                let key = parse_key(&key, id)?;
                let client = RingClient::new(node, &ring)?;
                let owner = client.insert(key.clone(), value.into_bytes()).await?;
                Ok(CommandResult::Stored { key, owner })
            }
            Command::Lookup { node, id, key } => {
                let key = parse_key(&key, id)?;
                let client = RingClient::new(node, &ring)?;
                Ok(CommandResult::Value(client.lookup(key).await?))
            }
            Command::Status { node } => {
                let client = RingClient::new(node, &ring)?;
                Ok(CommandResult::Status(client.status(None).await?))
            }
        }
    }
}
