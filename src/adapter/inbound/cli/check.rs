//! Handler for the `check` command: reach every configured path once.

use std::time::{Duration, Instant};

use super::command::ConfigPathArg;
use super::output;
use crate::adapter::outbound::postgres::PostgresConnector;
use crate::domain::RunMode;
use crate::error::{Error, Result, SessionError};
use crate::infrastructure::config::Config;
use crate::port::outbound::database::Connector;

pub async fn execute(args: &ConfigPathArg) -> Result<()> {
    let config = Config::load(&args.config)?;
    config.init_logging();

    output::section("Connection Check");
    output::field("Config", args.config.display());

    let mut unreachable = 0usize;
    for path in config.access_paths(RunMode::Both)? {
        let connector = PostgresConnector::new(&path, config.workload.statement_timeout());
        match probe(&connector).await {
            Ok(elapsed) => output::success(&format!(
                "{} ({}) {} in {} ms",
                path.name,
                path.kind,
                connector.target(),
                elapsed.as_millis()
            )),
            Err(e) => {
                unreachable += 1;
                output::error(&format!("{} ({}) {}: {e}", path.name, path.kind, connector.target()));
            }
        }
    }

    if unreachable > 0 {
        return Err(Error::Connection(format!("{unreachable} path(s) unreachable")));
    }
    output::success("All paths reachable");
    Ok(())
}

/// Connect, `SELECT 1`, close; returns the round trip.
async fn probe(connector: &dyn Connector) -> std::result::Result<Duration, SessionError> {
    let started = Instant::now();
    let mut session = connector.connect().await?;
    session.ping().await?;
    Ok(started.elapsed())
}
