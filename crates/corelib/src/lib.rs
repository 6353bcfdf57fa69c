//! Core library for the Chord ring.
//!
//! This crate provides the pure building blocks shared by every node:
//! - The m-bit identifier space and its interval arithmetic
//! - Identifiers, client keys and node references
//! - Finger tables
//! - Key/value shards
//! - Ring configuration and the error type

pub mod config;
pub mod error;
pub mod finger;
pub mod identifier;
pub mod node;
pub mod shard;
pub mod space;

pub use config::RingConfig;
pub use error::{Error, Result};
pub use finger::{FingerEntry, FingerTable};
pub use identifier::{Identifier, Key};
pub use node::{NodeRef, NodeStatus, Phase};
pub use shard::KeyValueShard;
pub use space::IdentifierSpace;
