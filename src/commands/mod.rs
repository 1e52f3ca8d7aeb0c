//! CLI command implementations for qnap-node-exporter.
//!
//! This module provides implementations for the CLI subcommands:
//! - `config`: Configuration file generation
//! - `test`: One or more collection passes printed to stdout

pub mod config;
pub mod test;

// Re-export command functions
pub use config::command_config;
pub use test::command_test;
