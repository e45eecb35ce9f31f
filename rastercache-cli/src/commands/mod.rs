//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration inspection (show, path, init)
//! - [`simulate`] - Synthetic concurrent workload through the cache

pub mod config;
pub mod simulate;
