//! Run configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all run settings.
//! Configuration is loaded from a TOML file; passwords come from the
//! environment (optionally via `.env`), never from the file itself.
//!
//! # Example
//!
//! ```no_run
//! use failwatch::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("failwatch.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::pool::{PathConfig, ReconnectionConfig};
use super::workload::{ProbeConfig, WorkloadConfig};
use crate::domain::{AccessPath, OperationWeights, RunMode};
use crate::error::{ConfigError, Result};

/// Main run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Measured test horizon in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Seconds between live status lines; 0 disables them.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,

    /// Seconds of unrecorded workload before measurement starts.
    #[serde(default)]
    pub warmup_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub workload: WorkloadConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Backoff for replacing dead pooled connections.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    #[serde(default)]
    pub paths: Vec<PathConfig>,
}

const fn default_duration_secs() -> u64 {
    300
}

const fn default_status_interval_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            status_interval_secs: default_status_interval_secs(),
            warmup_secs: 0,
            logging: LoggingConfig::default(),
            workload: WorkloadConfig::default(),
            probe: ProbeConfig::default(),
            reconnection: ReconnectionConfig::default(),
            paths: Vec::new(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// Resolves each path's password from the environment variable named by
    /// its `password_env`, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        for path in &mut config.paths {
            path.password = std::env::var(&path.password_env).unwrap_or_default();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed, or
    /// validation fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    ///
    /// Every rule runs before any worker starts.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.duration_secs == 0 {
            return Err(invalid("duration_secs", "must be greater than 0"));
        }

        let workload = &self.workload;
        validate_weights(&workload.weights)?;
        if workload.workers == 0 {
            return Err(invalid("workers", "must be greater than 0"));
        }
        if workload.failure_threshold == 0 {
            return Err(invalid("failure_threshold", "must be at least 1"));
        }
        if workload.pacing_min_ms > workload.pacing_max_ms {
            return Err(invalid("pacing_min_ms", "must be <= pacing_max_ms"));
        }
        if workload.statement_timeout_ms == 0 {
            return Err(invalid("statement_timeout_ms", "must be greater than 0"));
        }
        if workload.acquire_timeout_ms == 0 {
            return Err(invalid("acquire_timeout_ms", "must be greater than 0"));
        }
        if workload.user_id_max < 1 {
            return Err(invalid("user_id_max", "must be at least 1"));
        }
        if workload.product_id_max < 1 {
            return Err(invalid("product_id_max", "must be at least 1"));
        }

        if self.probe.enabled && self.probe.interval_ms == 0 {
            return Err(invalid("probe.interval_ms", "must be greater than 0"));
        }

        let reconnection = &self.reconnection;
        if reconnection.initial_delay_ms == 0 {
            return Err(invalid("initial_delay_ms", "must be greater than 0"));
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(invalid("max_delay_ms", "must be >= initial_delay_ms"));
        }
        if reconnection.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier", "must be >= 1.0"));
        }

        if self.paths.is_empty() {
            return Err(ConfigError::MissingField { field: "paths" }.into());
        }
        let mut seen = HashSet::new();
        for path in &self.paths {
            if path.name.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "paths.name" }.into());
            }
            if !seen.insert(path.name.as_str()) {
                return Err(invalid(
                    "paths.name",
                    format!("duplicate path name '{}'", path.name),
                ));
            }
            if path.host.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "paths.host" }.into());
            }
            if path.pool_size == 0 {
                return Err(invalid(
                    "pool_size",
                    format!("must be greater than 0 (path '{}')", path.name),
                ));
            }
            if path.connect_timeout_ms == 0 {
                return Err(invalid(
                    "connect_timeout_ms",
                    format!("must be greater than 0 (path '{}')", path.name),
                ));
            }
        }

        Ok(())
    }

    /// Initialize the tracing subscriber from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    #[must_use]
    pub const fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    /// `None` when live status is disabled.
    #[must_use]
    pub const fn status_interval(&self) -> Option<Duration> {
        if self.status_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.status_interval_secs))
        }
    }

    /// Access paths selected by `mode`, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if no configured path matches.
    #[allow(clippy::result_large_err)]
    pub fn access_paths(&self, mode: RunMode) -> Result<Vec<AccessPath>> {
        let selected: Vec<AccessPath> = self
            .paths
            .iter()
            .filter(|p| mode.includes(p.kind))
            .map(PathConfig::to_access_path)
            .collect();
        if selected.is_empty() {
            return Err(invalid(
                "mode",
                format!("no configured path matches mode '{mode}'"),
            ));
        }
        Ok(selected)
    }
}

#[allow(clippy::result_large_err)]
fn validate_weights(weights: &OperationWeights) -> Result<()> {
    let total = weights.total();
    if total != OperationWeights::REQUIRED_TOTAL {
        return Err(invalid(
            "weights",
            format!(
                "must sum to {}, got {total}",
                OperationWeights::REQUIRED_TOTAL
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PathKind;
    use crate::error::Error;

    const MINIMAL: &str = r#"
        [[paths]]
        name = "direct"
        kind = "direct"
        host = "db.local"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::parse_toml(MINIMAL).unwrap();
        assert_eq!(config.duration_secs, 300);
        assert_eq!(config.workload.workers, 3);
        assert_eq!(config.workload.failure_threshold, 3);
        assert_eq!(config.workload.weights, OperationWeights::new(70, 20, 10));
        assert_eq!(config.paths[0].pool_size, 5);
        assert_eq!(config.paths[0].port, 5432);
        assert!(!config.probe.enabled);
        assert_eq!(config.probe.interval_ms, 100);
    }

    #[test]
    fn weights_must_sum_to_100() {
        let toml = format!(
            "{MINIMAL}\n[workload.weights]\nread = 70\nwrite = 20\ntransaction = 5\n"
        );
        let result = Config::parse_toml(&toml);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { field: "weights", .. }))
        ));
    }

    #[test]
    fn zero_pool_size_rejected() {
        let mut config = Config::parse_toml(MINIMAL).unwrap();
        config.paths[0].pool_size = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "pool_size", .. }))
        ));
    }

    #[test]
    fn duplicate_path_names_rejected() {
        let mut config = Config::parse_toml(MINIMAL).unwrap();
        config
            .paths
            .push(PathConfig::new("direct", PathKind::Proxied, "proxy.local"));
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { field: "paths.name", .. }))
        ));
    }

    #[test]
    fn pacing_window_must_be_ordered() {
        let mut config = Config::parse_toml(MINIMAL).unwrap();
        config.workload.pacing_min_ms = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_paths_is_a_missing_field() {
        let result = Config::parse_toml("duration_secs = 10\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField { field: "paths" }))
        ));
    }

    #[test]
    fn mode_selects_paths() {
        let mut config = Config::parse_toml(MINIMAL).unwrap();
        config
            .paths
            .push(PathConfig::new("proxied", PathKind::Proxied, "proxy.local"));

        assert_eq!(config.access_paths(RunMode::Both).unwrap().len(), 2);
        let proxied = config.access_paths(RunMode::Proxied).unwrap();
        assert_eq!(proxied.len(), 1);
        assert_eq!(proxied[0].name.as_str(), "proxied");
    }

    #[test]
    fn mode_without_matching_path_is_rejected() {
        let config = Config::parse_toml(MINIMAL).unwrap();
        assert!(config.access_paths(RunMode::Proxied).is_err());
    }

    #[test]
    fn status_interval_zero_disables() {
        let mut config = Config::parse_toml(MINIMAL).unwrap();
        config.status_interval_secs = 0;
        assert_eq!(config.status_interval(), None);
    }
}
