//! Command line front end for Chord rings.
//!
//! Provides commands for:
//! - Running a node (`serve`)
//! - Storing and fetching values (`insert`, `lookup`)
//! - Inspecting a node (`status`)

pub mod commands;
pub mod config;

pub use commands::CommandResult;
pub use config::{CliConfig, Command};
