//! Ring identifiers and client keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position on the identifier circle.
///
/// Always already reduced into the `[0, 2^m)` range of the
/// [`IdentifierSpace`](crate::space::IdentifierSpace) that produced it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Identifier(pub u64);

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Identifier {
    fn from(raw: u64) -> Self {
        Identifier(raw)
    }
}

/// A key handed to the store by a client.
///
/// Raw keys are hashed onto the ring; explicit identifiers are used as-is
/// and must already lie in the space.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Key {
    Id(Identifier),
    Raw(Vec<u8>),
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Raw(key.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Raw(key.into_bytes())
    }
}

impl From<&[u8]> for Key {
    fn from(key: &[u8]) -> Self {
        Key::Raw(key.to_vec())
    }
}

impl From<Identifier> for Key {
    fn from(id: Identifier) -> Self {
        Key::Id(id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "#{}", id),
            Key::Raw(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}
