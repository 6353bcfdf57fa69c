//! RPC transport between ring nodes.
//!
//! This crate provides the wire protocol and plumbing every cross-node call
//! goes through:
//! - Request/response enums for the closed set of ring operations
//! - A length-prefixed `bincode` frame codec
//! - A client that bounds every call with a timeout
//! - A server that handles each inbound connection on its own task

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::RpcClient;
pub use error::TransportError;
pub use protocol::{Envelope, Reply, Request, Response};
pub use server::{RpcHandler, RpcServer};
