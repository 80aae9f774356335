//! Access path identity and connection parameters.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Access path name - newtype for type safety.
///
/// Names are unique within a run and are used as the key for all per-path
/// state (pool, monitors, aggregates).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathName(String);

impl PathName {
    /// Create a new `PathName` from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the path name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PathName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PathName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Connection strategy used by an access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    /// Straight to the database cluster endpoint.
    Direct,
    /// Through a connection proxy in front of the cluster.
    #[serde(alias = "proxy")]
    Proxied,
}

impl PathKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Proxied => "proxied",
        }
    }
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which access paths a run exercises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Direct,
    Proxied,
    /// Both kinds, concurrently, against independent state.
    #[default]
    Both,
}

impl RunMode {
    #[must_use]
    pub const fn includes(self, kind: PathKind) -> bool {
        matches!(
            (self, kind),
            (Self::Both, _) | (Self::Direct, PathKind::Direct) | (Self::Proxied, PathKind::Proxied)
        )
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "direct",
            Self::Proxied => "proxied",
            Self::Both => "both",
        })
    }
}

/// Network endpoint and credentials for one access path.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

/// One end-to-end connection strategy to the database.
///
/// Built once from configuration and never mutated afterwards; workers,
/// pools and probes share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
    pub name: PathName,
    pub kind: PathKind,
    pub endpoint: Endpoint,
    pub pool_size: usize,
    pub connect_timeout: Duration,
}

impl AccessPath {
    #[must_use]
    pub fn name(&self) -> &PathName {
        &self.name
    }
}
