//! CLI subcommand implementations.

pub mod active;
pub mod cleanup;
pub mod report;
pub mod session;
pub mod status;
