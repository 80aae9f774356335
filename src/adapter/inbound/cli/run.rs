//! Handler for the `run` command.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use super::command::RunArgs;
use super::{output, report};
use crate::adapter::inbound::pgbench;
use crate::adapter::outbound::postgres::PostgresConnector;
use crate::application::run::{ConnectorFactory, FailoverRun, LoadSource};
use crate::domain::{AccessPath, PathName};
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::port::outbound::database::Connector;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    apply_overrides(&mut config, args, output::is_json());
    config.init_logging();

    let statement_timeout = config.workload.statement_timeout();
    let connectors: ConnectorFactory = Arc::new(move |path: &AccessPath| {
        Arc::new(PostgresConnector::new(path, statement_timeout)) as Arc<dyn Connector>
    });

    let mut run = FailoverRun::new(config.clone(), args.mode.into(), connectors)?;
    for input in &args.load_inputs {
        let file = tokio::fs::File::open(&input.file).await?;
        run.add_load_source(LoadSource {
            path: PathName::from(input.path.as_str()),
            reader: Box::new(BufReader::new(file)),
            parser: pgbench::parse_line,
        })?;
    }

    print_startup(&config, &run);

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut handle = tokio::spawn(run.execute(stop_rx));
    let report = tokio::select! {
        result = &mut handle => result??,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received (Ctrl+C)");
            let _ = stop_tx.send(true);
            handle.await??
        }
    };

    report::render(&report)?;
    if let Some(path) = &args.report {
        report::write_json(&report, path)?;
        output::success(&format!("Report written to {}", path.display()));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs, force_json_logs: bool) {
    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    if let Some(warmup) = args.warmup {
        config.warmup_secs = warmup;
    }
    if let Some(seed) = args.seed {
        config.workload.seed = Some(seed);
    }
    if args.probe {
        config.probe.enabled = true;
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs || force_json_logs {
        config.logging.format = "json".to_string();
    }
}

fn print_startup(config: &Config, run: &FailoverRun) {
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Duration", format!("{} s", config.duration_secs));
    if config.warmup_secs > 0 {
        output::field("Warm-up", format!("{} s", config.warmup_secs));
    }
    let weights = config.workload.weights;
    output::field(
        "Workload",
        format!(
            "{} workers/path, {}/{}/{} read/write/txn",
            config.workload.workers, weights.read, weights.write, weights.transaction
        ),
    );
    output::field("Threshold", config.workload.failure_threshold);
    for path in run.paths() {
        output::field(
            path.name.as_str(),
            format!(
                "{} {} (pool {})",
                path.kind,
                output::highlight(&path.endpoint),
                path.pool_size
            ),
        );
    }
    if config.probe.enabled {
        output::field("Probe", format!("every {} ms", config.probe.interval_ms));
    }
    output::hint("Trigger the failover now; press Ctrl+C to stop early");
}
