//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use crate::domain::PathKind;
use crate::infrastructure::config::{
    Config, PathConfig, ProbeConfig, ReconnectionConfig, WorkloadConfig,
};
use crate::infrastructure::pool::PoolSettings;

/// Short, non-zero backoff so replacement loops always yield.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 10,
        max_delay_ms: 50,
        backoff_multiplier: 2.0,
    }
}

pub fn pool_settings(size: usize) -> PoolSettings {
    PoolSettings {
        size,
        acquire_timeout: Duration::from_millis(200),
        reconnection: reconnection(),
    }
}

/// Default workload with a fixed seed.
pub fn workload() -> WorkloadConfig {
    WorkloadConfig {
        seed: Some(7),
        ..WorkloadConfig::default()
    }
}

pub fn path(name: &str, kind: PathKind) -> PathConfig {
    PathConfig::new(name, kind, "localhost")
}

/// A valid config with a `direct` and a `proxied` path.
pub fn config() -> Config {
    Config {
        duration_secs: 10,
        status_interval_secs: 0,
        workload: workload(),
        probe: ProbeConfig::default(),
        reconnection: reconnection(),
        paths: vec![
            path("direct", PathKind::Direct),
            path("proxied", PathKind::Proxied),
        ],
        ..Config::default()
    }
}

/// Minimal TOML accepted by [`Config::parse_toml`].
pub fn toml_two_paths() -> &'static str {
    r#"
duration_secs = 10

[workload]
workers = 3
failure_threshold = 3

[workload.weights]
read = 70
write = 20
transaction = 10

[[paths]]
name = "direct"
kind = "direct"
host = "localhost"

[[paths]]
name = "proxied"
kind = "proxied"
host = "localhost"
port = 6432
"#
}
