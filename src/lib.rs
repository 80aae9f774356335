//! failwatch - measure database downtime during a live failover.
//!
//! A fixed set of workers per access path runs a weighted mix of business
//! operations (reads, writes, a lock-holding purchase transaction) through a
//! per-path connection pool. Every outcome feeds a consecutive-failure state
//! machine that turns runs of failures into downtime intervals, so a direct
//! connection and a proxied one can be compared under the same failover.
//!
//! # Modules
//!
//! - [`domain`] - Pure types: access paths, outcomes, the health state
//!   machine, downtime intervals
//! - [`port`] - The database and outcome-sink traits
//! - [`application`] - Catalog, executor, dispatcher, monitors,
//!   aggregation, probe, load-generator bridge and the run itself
//! - [`adapter`] - PostgreSQL, the CLI and the pgbench output parser
//! - [`infrastructure`] - Configuration, logging and the connection pool
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use failwatch::adapter::outbound::postgres::PostgresConnector;
//! use failwatch::application::run::{ConnectorFactory, FailoverRun};
//! use failwatch::domain::{AccessPath, RunMode};
//! use failwatch::infrastructure::config::Config;
//! use failwatch::port::Connector;
//!
//! # async fn example() -> failwatch::error::Result<()> {
//! let config = Config::load("failwatch.toml")?;
//! let timeout = config.workload.statement_timeout();
//! let connectors: ConnectorFactory = Arc::new(move |path: &AccessPath| {
//!     Arc::new(PostgresConnector::new(path, timeout)) as Arc<dyn Connector>
//! });
//! let (_stop, stop_rx) = tokio::sync::watch::channel(false);
//! let report = FailoverRun::new(config, RunMode::Both, connectors)?
//!     .execute(stop_rx)
//!     .await?;
//! println!("{:?}", report.comparison);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
