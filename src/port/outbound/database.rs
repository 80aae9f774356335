//! Database port.
//!
//! The engine talks to the database only through these traits, so the
//! workload, pool and probe code runs unchanged against PostgreSQL or the
//! simulated databases in [`testkit`](crate::testkit).

use std::fmt;

use async_trait::async_trait;

use crate::error::SessionError;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
        }
    }
}

/// A statement template with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: &'static str,
    pub params: Vec<Param>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: &'static str, params: Vec<Param>) -> Self {
        Self { sql, params }
    }
}

/// A live database session.
///
/// Owned by the pool while idle and lent to exactly one worker while in use.
#[async_trait]
pub trait Session: Send {
    /// Run one statement; returns the rows returned or affected.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError>;

    /// Run `statements` as one atomic unit.
    ///
    /// Commits when every statement succeeds and rolls back on the first
    /// error. Returns the rows affected across all statements.
    async fn transaction(&mut self, statements: &[Statement]) -> Result<u64, SessionError>;

    /// Cheapest possible round trip (`SELECT 1`).
    async fn ping(&mut self) -> Result<(), SessionError>;

    /// Whether the underlying link is known to be gone.
    fn is_closed(&self) -> bool;
}

/// Opens new sessions for one access path.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Session>, SessionError>;

    /// Human-readable target, without credentials.
    fn target(&self) -> String;
}
