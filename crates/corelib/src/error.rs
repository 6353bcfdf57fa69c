//! Error types for the ring.

use crate::identifier::Identifier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by ring operations.
///
/// Errors are serialisable: a failure inside a remote node is shipped back
/// to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Error {
    /// Successor/predecessor search exceeded its hop bound or hit an
    /// inconsistent ring.
    #[error("Routing failure: {0}")]
    RoutingFailure(String),
    /// RPC timed out or the connection was refused.
    #[error("Remote node {addr} unreachable: {reason}")]
    RemoteUnreachable { addr: String, reason: String },
    /// Lookup of an absent key.
    #[error("Key not found: {0}")]
    KeyNotFound(Identifier),
    /// Malformed or unexpected RPC payload.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    /// Invalid configuration, including a ring width mismatch between nodes.
    #[error("Misconfiguration: {0}")]
    Misconfigured(String),
    /// Local socket failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Failures a client may retry once the ring settles.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RemoteUnreachable { .. } | Error::RoutingFailure(_))
    }

    pub fn unreachable(addr: impl Into<String>, reason: impl ToString) -> Self {
        Error::RemoteUnreachable {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
