//! CLI command implementations.

pub mod common;
pub mod config;
pub mod serve;
pub mod snapshot;
pub mod watch;
