//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! measurement logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading and validation
//! - [`pool`] - Per-path connection pool with background replacement

pub mod config;
pub mod pool;
