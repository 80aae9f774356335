//! Handler for `config validate`.

use super::command::ConfigPathArg;
use super::output;
use crate::domain::RunMode;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Validate a configuration file without connecting anywhere.
pub fn validate(args: &ConfigPathArg) -> Result<()> {
    let config = Config::load(&args.config)?;

    output::section("Configuration Check");
    output::field("Config", args.config.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("Duration", format!("{} s", config.duration_secs));
    output::field("Workers", format!("{} per path", config.workload.workers));
    let weights = config.workload.weights;
    output::field(
        "Weights",
        format!(
            "read {} / write {} / transaction {}",
            weights.read, weights.write, weights.transaction
        ),
    );
    output::field("Threshold", config.workload.failure_threshold);
    output::field(
        "Probe",
        if config.probe.enabled {
            format!("every {} ms", config.probe.interval_ms)
        } else {
            "disabled".to_string()
        },
    );
    for path in config.access_paths(RunMode::Both)? {
        output::field(
            path.name.as_str(),
            format!("{} {} (pool {})", path.kind, path.endpoint, path.pool_size),
        );
        if path.endpoint.password.is_empty() {
            output::note("no password found in the environment for this path");
        }
    }
    Ok(())
}
