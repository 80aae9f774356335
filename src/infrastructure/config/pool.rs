//! Per-path connection settings and pool reconnection backoff.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::{AccessPath, Endpoint, PathKind, PathName};

/// Backoff applied when the pool fails to open a replacement connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Initial delay before first reconnection attempt (milliseconds).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

const fn default_initial_delay_ms() -> u64 {
    100
}

const fn default_max_delay_ms() -> u64 {
    2_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// One `[[paths]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    pub name: String,
    pub kind: PathKind,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    /// Environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Resolved from `password_env` at load time, never read from the file.
    #[serde(skip)]
    pub password: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".into()
}

fn default_user() -> String {
    "postgres".into()
}

fn default_password_env() -> String {
    "PGPASSWORD".into()
}

const fn default_pool_size() -> usize {
    5
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl PathConfig {
    /// Minimal entry with defaults for everything but identity and host.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PathKind, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            host: host.into(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password_env: default_password_env(),
            password: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    /// Build the immutable runtime view of this path.
    #[must_use]
    pub fn to_access_path(&self) -> AccessPath {
        AccessPath {
            name: PathName::new(self.name.clone()),
            kind: self.kind,
            endpoint: Endpoint {
                host: self.host.clone(),
                port: self.port,
                database: self.database.clone(),
                user: self.user.clone(),
                password: self.password.clone(),
            },
            pool_size: self.pool_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}
