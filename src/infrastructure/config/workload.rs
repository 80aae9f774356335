//! Workload and probe configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::OperationWeights;

/// `[workload]`: how each path's workers behave.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Worker tasks per access path.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Consecutive failures that declare a path down.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_pacing_min_ms")]
    pub pacing_min_ms: u64,
    #[serde(default = "default_pacing_max_ms")]
    pub pacing_max_ms: u64,
    /// Upper bound on one operation, lock waits included.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// Longest a worker waits for a pooled connection.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Synthetic user ids are drawn from `1..=user_id_max`.
    #[serde(default = "default_user_id_max")]
    pub user_id_max: i64,
    /// Synthetic product ids are drawn from `1..=product_id_max`.
    #[serde(default = "default_product_id_max")]
    pub product_id_max: i64,
    /// Fixed seed for reproducible draws; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub weights: OperationWeights,
}

const fn default_workers() -> usize {
    3
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_pacing_min_ms() -> u64 {
    100
}

const fn default_pacing_max_ms() -> u64 {
    500
}

const fn default_statement_timeout_ms() -> u64 {
    3_000
}

const fn default_acquire_timeout_ms() -> u64 {
    1_000
}

const fn default_user_id_max() -> i64 {
    1_000
}

const fn default_product_id_max() -> i64 {
    100
}

impl WorkloadConfig {
    #[must_use]
    pub const fn pacing(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.pacing_min_ms),
            Duration::from_millis(self.pacing_max_ms),
        )
    }

    #[must_use]
    pub const fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            failure_threshold: default_failure_threshold(),
            pacing_min_ms: default_pacing_min_ms(),
            pacing_max_ms: default_pacing_max_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            user_id_max: default_user_id_max(),
            product_id_max: default_product_id_max(),
            seed: None,
            weights: OperationWeights::default(),
        }
    }
}

/// `[probe]`: the lightweight connect-and-ping loop.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_probe_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

const fn default_probe_interval_ms() -> u64 {
    100
}

const fn default_probe_connect_timeout_ms() -> u64 {
    1_000
}

impl ProbeConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_probe_interval_ms(),
            connect_timeout_ms: default_probe_connect_timeout_ms(),
        }
    }
}
