//! Chord ring nodes.
//!
//! A [`RingNode`] serves the ring RPCs over TCP, routes lookups through its
//! finger table and stores the keys in `(predecessor, self]`. Nodes only
//! ever join; there is no departure, failure detection or periodic
//! stabilization.
//!
//! ```no_run
//! # async fn demo() -> corelib::Result<()> {
//! use chord::{NodeConfig, RingNode};
//!
//! let seed = RingNode::launch(NodeConfig::new("127.0.0.1:7000")).await?;
//! let peer = RingNode::launch(NodeConfig::new("127.0.0.1:7001").with_join("127.0.0.1:7000")).await?;
//! peer.insert("answer", b"42".to_vec()).await?;
//! assert_eq!(seed.lookup("answer").await?, b"42".to_vec());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod handler;
mod join;
pub mod node;

pub use client::RingClient;
pub use config::NodeConfig;
pub use node::RingNode;
