//! Presence CLI library.
//!
//! This crate provides the CLI interface for session presence tracking.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::{Config, DEFAULT_STALE_AFTER_SECS};
