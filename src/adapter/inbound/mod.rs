//! Inbound adapters: the CLI and parsers for external tool output.

pub mod cli;
pub mod pgbench;
