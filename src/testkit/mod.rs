//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`db`]: simulated databases implementing the
//!   [`Connector`](crate::port::outbound::database::Connector) port.
//! - [`config`]: canonical test configurations.
//! - [`sink`]: an [`OutcomeSink`](crate::port::outbound::sink::OutcomeSink)
//!   that keeps every submission for inspection.

pub mod config;
pub mod db;
pub mod sink;
