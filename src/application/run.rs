//! One failover measurement run, end to end.
//!
//! [`FailoverRun`] wires the per-path components together:
//!
//! ```text
//!            ┌──────────────┐  outcomes   ┌─────────────┐
//!  workers ─▶│ConnectionPool│────────────▶│ RunRecorder │◀── probe
//!            └──────────────┘             └─────────────┘◀── load bridge
//! ```
//!
//! The run owns a single [`RunClock`]; the warm-up, the measured horizon and
//! every timestamp in the report are offsets from it. Stopping early (Ctrl+C
//! or the caller's stop signal) is cooperative: workers finish their
//! in-flight operation and then return, and the report is built from
//! whatever was recorded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::io::AsyncBufRead;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::catalog::OperationCatalog;
use crate::application::dispatcher::{ConcurrentDispatcher, DispatchSummary, DispatcherSettings};
use crate::application::executor::OperationExecutor;
use crate::application::loadgen::{LineParser, LoadBridge, PumpSummary};
use crate::application::probe::{Probe, ProbeSettings, ProbeSummary};
use crate::application::recorder::{RecorderSettings, RunRecorder, RunSnapshot};
use crate::domain::{AccessPath, HealthState, PathKind, PathName, RunClock, RunMode};
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::Config;
use crate::infrastructure::pool::{ConnectionPool, PoolSettings, PoolStats};
use crate::port::outbound::database::Connector;
use crate::port::outbound::sink::OutcomeSink;

/// Builds the connector for one access path.
pub type ConnectorFactory = Arc<dyn Fn(&AccessPath) -> Arc<dyn Connector> + Send + Sync>;

/// Output of an external load generator bound to one path.
pub struct LoadSource {
    pub path: PathName,
    pub reader: Box<dyn AsyncBufRead + Unpin + Send>,
    pub parser: LineParser,
}

/// Final per-path figures.
#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    #[serde(flatten)]
    pub snapshot: RunSnapshot,
    pub pool: PoolStats,
    pub dispatch: DispatchSummary,
    pub probe_summary: Option<ProbeSummary>,
    pub load_summary: Option<PumpSummary>,
}

impl PathReport {
    #[must_use]
    pub fn total_downtime(&self) -> Duration {
        self.snapshot.workload.summary.total
    }
}

/// Proxied path measured against the direct one.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub direct: PathName,
    pub proxied: PathName,
    pub direct_downtime_secs: f64,
    pub proxied_downtime_secs: f64,
    /// `(direct - proxied) / direct * 100`; `None` when direct saw no
    /// downtime.
    pub downtime_reduction_pct: Option<f64>,
    /// Success-rate difference in percentage points, proxied minus direct.
    pub success_rate_delta_pct: f64,
    /// Mean-latency change in percent, proxied relative to direct.
    pub latency_change_pct: Option<f64>,
}

impl Comparison {
    fn between(direct: &PathReport, proxied: &PathReport) -> Self {
        let direct_downtime = direct.total_downtime().as_secs_f64();
        let proxied_downtime = proxied.total_downtime().as_secs_f64();
        let direct_latency = direct.snapshot.aggregate.latency.mean_ms;
        let proxied_latency = proxied.snapshot.aggregate.latency.mean_ms;

        Self {
            direct: direct.snapshot.path.clone(),
            proxied: proxied.snapshot.path.clone(),
            direct_downtime_secs: direct_downtime,
            proxied_downtime_secs: proxied_downtime,
            downtime_reduction_pct: (direct_downtime > 0.0)
                .then(|| (direct_downtime - proxied_downtime) / direct_downtime * 100.0),
            success_rate_delta_pct: (proxied.snapshot.aggregate.success_rate()
                - direct.snapshot.aggregate.success_rate())
                * 100.0,
            latency_change_pct: (direct_latency > 0.0 && proxied_latency > 0.0)
                .then(|| (proxied_latency - direct_latency) / direct_latency * 100.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub measured_secs: f64,
    pub warmup_secs: u64,
    pub failure_threshold: u32,
    /// Stopped before the configured duration elapsed.
    pub interrupted: bool,
    pub paths: Vec<PathReport>,
    pub comparison: Option<Comparison>,
}

impl RunReport {
    #[must_use]
    pub fn path(&self, name: &str) -> Option<&PathReport> {
        self.paths.iter().find(|p| p.snapshot.path.as_str() == name)
    }
}

struct PathRuntime {
    path: AccessPath,
    pool: Arc<ConnectionPool>,
    dispatcher: ConcurrentDispatcher,
    probe: Option<Probe>,
}

/// A validated, ready-to-execute run.
pub struct FailoverRun {
    config: Config,
    mode: RunMode,
    paths: Vec<AccessPath>,
    connectors: ConnectorFactory,
    load_sources: Vec<LoadSource>,
}

impl FailoverRun {
    /// Validate `config` and select the paths for `mode`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails or `mode` selects
    /// no configured path. Nothing has been started at that point.
    #[allow(clippy::result_large_err)]
    pub fn new(config: Config, mode: RunMode, connectors: ConnectorFactory) -> Result<Self> {
        config.validate()?;
        let paths = config.access_paths(mode)?;
        Ok(Self {
            config,
            mode,
            paths,
            connectors,
            load_sources: Vec::new(),
        })
    }

    /// Feed a load generator's output into `path`'s snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not part of this run.
    #[allow(clippy::result_large_err)]
    pub fn add_load_source(&mut self, source: LoadSource) -> Result<()> {
        if !self.paths.iter().any(|p| p.name == source.path) {
            return Err(ConfigError::InvalidValue {
                field: "load_input",
                reason: format!("unknown access path '{}'", source.path),
            }
            .into());
        }
        self.load_sources.push(source);
        Ok(())
    }

    #[must_use]
    pub fn paths(&self) -> &[AccessPath] {
        &self.paths
    }

    /// Execute the run until the configured horizon or `stop`.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pool cannot be created; database failures
    /// during the run are measured, not propagated.
    pub async fn execute(self, stop: watch::Receiver<bool>) -> Result<RunReport> {
        let Self {
            config,
            mode,
            paths,
            connectors,
            load_sources,
        } = self;
        let clock = RunClock::start();
        let warmup = config.warmup();
        let horizon = warmup + config.duration();

        let recorder = Arc::new(RunRecorder::new(
            clock,
            &paths,
            RecorderSettings {
                failure_threshold: config.workload.failure_threshold,
                probe_enabled: config.probe.enabled,
                warmup: !warmup.is_zero(),
            },
        ));
        let sink: Arc<dyn OutcomeSink> = Arc::clone(&recorder) as Arc<dyn OutcomeSink>;

        let runtimes = build_paths(&config, &paths, &connectors, clock, horizon, &sink).await?;

        info!(
            mode = %mode,
            paths = runtimes.len(),
            duration_secs = config.duration_secs,
            warmup_secs = config.warmup_secs,
            workers = config.workload.workers,
            "Failover run started"
        );

        let (halt_tx, halt_rx) = watch::channel(false);
        let (recording_tx, recording_rx) = watch::channel(warmup.is_zero());
        let control = tokio::spawn(control_loop(
            Arc::clone(&recorder),
            warmup,
            horizon,
            stop,
            halt_tx,
            recording_tx,
        ));
        let status = config
            .status_interval()
            .map(|every| tokio::spawn(status_loop(Arc::clone(&recorder), every, halt_rx.clone())));

        let bridge = LoadBridge::new(Arc::clone(&recorder));
        let pumps = join_all(load_sources.into_iter().map(|source| {
            let bridge = bridge.clone();
            let mut recording = recording_rx.clone();
            let mut halt = halt_rx.clone();
            async move {
                // Start reading once warm-up ends.
                let started = async { recording.wait_for(|on| *on).await.is_ok() };
                let started = tokio::select! {
                    started = started => started,
                    () = stopped(&mut halt) => false,
                };
                if !started {
                    return None;
                }
                let summary = bridge
                    .pump(&source.path, source.reader, source.parser, halt)
                    .await;
                match summary {
                    Ok(summary) => Some((source.path, summary)),
                    Err(e) => {
                        warn!(path = %source.path, error = %e, "Load input failed");
                        None
                    }
                }
            }
        }));
        let dispatches = join_all(runtimes.iter().map(|rt| rt.dispatcher.run(halt_rx.clone())));
        let probes = join_all(runtimes.iter().map(|rt| {
            let halt = halt_rx.clone();
            async move {
                match &rt.probe {
                    Some(probe) => Some(probe.run(halt).await),
                    None => None,
                }
            }
        }));

        let (dispatches, probes, pumps) = tokio::join!(dispatches, probes, pumps);

        let interrupted = match control.await {
            Ok(interrupted) => interrupted,
            Err(e) => {
                warn!(error = %e, "Run control task failed");
                true
            }
        };
        if let Some(status) = status {
            status.abort();
        }

        let ended_at = clock.now();
        recorder.finish(ended_at);

        let mut reports = Vec::with_capacity(runtimes.len());
        for ((rt, dispatch), probe_summary) in runtimes.iter().zip(dispatches).zip(probes) {
            let pool = rt.pool.stats();
            rt.pool.shutdown();
            let Some(snapshot) = recorder.aggregate(&rt.path.name) else {
                continue;
            };
            let load_summary = pumps
                .iter()
                .flatten()
                .find(|(path, _)| *path == rt.path.name)
                .map(|(_, summary)| *summary);
            reports.push(PathReport {
                snapshot,
                pool,
                dispatch,
                probe_summary,
                load_summary,
            });
        }

        let comparison = compare(&reports);
        let report = RunReport {
            mode,
            started_at: clock.anchor(),
            ended_at,
            measured_secs: recorder.measured_elapsed().as_secs_f64(),
            warmup_secs: config.warmup_secs,
            failure_threshold: config.workload.failure_threshold,
            interrupted,
            paths: reports,
            comparison,
        };

        for path in &report.paths {
            info!(
                path = %path.snapshot.path,
                operations = path.snapshot.aggregate.attempted(),
                success_rate = path.snapshot.aggregate.success_rate(),
                downtime_secs = path.total_downtime().as_secs_f64(),
                intervals = path.snapshot.workload.summary.count,
                "Path finished"
            );
        }
        info!(interrupted, "Failover run finished");
        Ok(report)
    }
}

/// Open every path's pool concurrently and wire its dispatcher and probe.
async fn build_paths(
    config: &Config,
    paths: &[AccessPath],
    connectors: &ConnectorFactory,
    clock: RunClock,
    horizon: Duration,
    sink: &Arc<dyn OutcomeSink>,
) -> Result<Vec<PathRuntime>> {
    let workload = &config.workload;
    let catalog = Arc::new(OperationCatalog::new(
        workload.weights,
        workload.user_id_max,
        workload.product_id_max,
    ));
    let executor = Arc::new(OperationExecutor::new(
        catalog,
        workload.statement_timeout(),
        clock,
    ));
    let (pacing_min, pacing_max) = workload.pacing();

    let path_connectors: Vec<Arc<dyn Connector>> =
        paths.iter().map(|path| connectors(path)).collect();
    let pools = join_all(paths.iter().zip(&path_connectors).map(|(path, connector)| {
        ConnectionPool::open(
            path.name.clone(),
            Arc::clone(connector),
            PoolSettings {
                size: path.pool_size,
                acquire_timeout: workload.acquire_timeout(),
                reconnection: config.reconnection.clone(),
            },
        )
    }))
    .await;

    let mut runtimes = Vec::with_capacity(paths.len());
    for ((path, connector), pool) in paths.iter().zip(path_connectors).zip(pools) {
        let pool = Arc::new(pool?);
        let dispatcher = ConcurrentDispatcher::new(
            path.name.clone(),
            Arc::clone(&pool),
            Arc::clone(&executor),
            Arc::clone(sink),
            DispatcherSettings {
                workers: workload.workers,
                pacing_min,
                pacing_max,
                seed: workload.seed,
                horizon,
            },
        );
        let probe = config.probe.enabled.then(|| {
            Probe::new(
                path.name.clone(),
                connector,
                Arc::clone(sink),
                clock,
                ProbeSettings {
                    interval: config.probe.interval(),
                    timeout: config.probe.connect_timeout(),
                    horizon,
                },
            )
        });
        runtimes.push(PathRuntime {
            path: path.clone(),
            pool,
            dispatcher,
            probe,
        });
    }
    Ok(runtimes)
}

/// First direct path against first proxied path.
fn compare(paths: &[PathReport]) -> Option<Comparison> {
    let direct = paths.iter().find(|p| p.snapshot.kind == PathKind::Direct)?;
    let proxied = paths.iter().find(|p| p.snapshot.kind == PathKind::Proxied)?;
    Some(Comparison::between(direct, proxied))
}

/// Ends warm-up and announces it on `recording`, then raises `halt` at the
/// horizon or on `stop`.
///
/// Returns whether the run was stopped early.
async fn control_loop(
    recorder: Arc<RunRecorder>,
    warmup: Duration,
    horizon: Duration,
    mut stop: watch::Receiver<bool>,
    halt: watch::Sender<bool>,
    recording: watch::Sender<bool>,
) -> bool {
    let anchor = recorder.clock().monotonic_anchor();
    let mut interrupted = false;

    if !warmup.is_zero() {
        tokio::select! {
            () = tokio::time::sleep_until(anchor + warmup) => {
                recorder.start_recording();
                let _ = recording.send(true);
                info!(warmup_secs = warmup.as_secs(), "Warm-up complete, recording");
            }
            () = stopped(&mut stop) => interrupted = true,
        }
    }

    if !interrupted {
        tokio::select! {
            () = tokio::time::sleep_until(anchor + horizon) => {}
            () = stopped(&mut stop) => interrupted = true,
        }
    }

    if interrupted {
        info!("Stop requested, waiting for in-flight operations");
    }
    let _ = halt.send(true);
    interrupted
}

/// Resolves once `stop` reads true. A dropped sender never resolves.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn status_loop(recorder: Arc<RunRecorder>, every: Duration, mut halt: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => log_status(&recorder),
            changed = halt.changed() => {
                if changed.is_err() || *halt.borrow() {
                    return;
                }
            }
        }
    }
}

fn log_status(recorder: &RunRecorder) {
    if !recorder.is_recording() {
        debug!("Warming up");
        return;
    }
    let now = recorder.clock().now();
    for snapshot in recorder.snapshot() {
        let open_for = snapshot
            .workload
            .intervals
            .iter()
            .find(|i| i.is_open())
            .map(|i| i.elapsed(now).as_secs_f64());
        let downtime: f64 = snapshot
            .workload
            .intervals
            .iter()
            .map(|i| i.elapsed(now).as_secs_f64())
            .sum();
        let aggregate = &snapshot.aggregate;
        let success_pct = aggregate.success_rate() * 100.0;
        if snapshot.state == HealthState::Down {
            warn!(
                path = %snapshot.path,
                operations = aggregate.attempted(),
                success_pct,
                downtime_secs = downtime,
                down_for_secs = ?open_for,
                "Status: DOWN"
            );
        } else {
            info!(
                path = %snapshot.path,
                state = %snapshot.state,
                operations = aggregate.attempted(),
                success_pct,
                tps = aggregate.tps,
                downtime_secs = downtime,
                "Status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregator::LoadEvent;
    use crate::testkit::config;
    use crate::testkit::db::{OutageConnector, ScriptedConnector};
    use crate::testkit::sink::RecordingSink;

    fn scripted() -> ConnectorFactory {
        Arc::new(|_: &AccessPath| Arc::new(ScriptedConnector::new()) as Arc<dyn Connector>)
    }

    #[test]
    fn invalid_config_is_rejected_before_start() {
        let mut cfg = config::config();
        cfg.workload.weights.read = 65;
        assert!(FailoverRun::new(cfg, RunMode::Both, scripted()).is_err());
    }

    #[test]
    fn mode_selects_paths() {
        let run = FailoverRun::new(config::config(), RunMode::Proxied, scripted()).unwrap();
        assert_eq!(run.paths().len(), 1);
        assert_eq!(run.paths()[0].kind, PathKind::Proxied);
    }

    #[test]
    fn load_source_for_unknown_path_is_rejected() {
        let mut run = FailoverRun::new(config::config(), RunMode::Direct, scripted()).unwrap();
        let source = LoadSource {
            path: PathName::from("proxied"),
            reader: Box::new(&b""[..]),
            parser: |_| None,
        };
        assert!(run.add_load_source(source).is_err());
    }

    /// `<secs>,<tps>` lines.
    fn samples(line: &str) -> Option<LoadEvent> {
        let (secs, tps) = line.split_once(',')?;
        Some(LoadEvent::Progress {
            offset: Some(Duration::from_secs(secs.parse().ok()?)),
            tps: tps.parse().ok()?,
            latency_ms: None,
            failed: 0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn pools_for_all_paths_open_together() {
        let cfg = config::config();
        let paths = cfg.access_paths(RunMode::Both).unwrap();
        let factory: ConnectorFactory = Arc::new(|_: &AccessPath| {
            Arc::new(ScriptedConnector::new().with_connect_latency(Duration::from_secs(1)))
                as Arc<dyn Connector>
        });
        let clock = RunClock::start();
        let sink: Arc<dyn OutcomeSink> = Arc::new(RecordingSink::new());

        let runtimes = build_paths(&cfg, &paths, &factory, clock, cfg.duration(), &sink)
            .await
            .unwrap();

        assert_eq!(runtimes.len(), 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
        for rt in &runtimes {
            assert_eq!(rt.pool.stats().idle, rt.path.pool_size);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_run_reports_both_paths_without_downtime() {
        let run = FailoverRun::new(config::config(), RunMode::Both, scripted()).unwrap();
        let (_tx, rx) = watch::channel(false);

        let report = run.execute(rx).await.unwrap();

        assert!(!report.interrupted);
        assert_eq!(report.paths.len(), 2);
        for path in &report.paths {
            assert!(path.snapshot.aggregate.attempted() > 0);
            assert_eq!(path.snapshot.aggregate.success_rate(), 1.0);
            assert!(path.snapshot.workload.intervals.is_empty());
        }
        let comparison = report.comparison.unwrap();
        assert_eq!(comparison.downtime_reduction_pct, None);
        assert_eq!(comparison.success_rate_delta_pct, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_signal_interrupts_run() {
        let run = FailoverRun::new(config::config(), RunMode::Direct, scripted()).unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run.execute(rx));
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(true).unwrap();

        let report = handle.await.unwrap().unwrap();
        assert!(report.interrupted);
        assert!(report.measured_secs < 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_outcomes_are_not_recorded() {
        let mut cfg = config::config();
        cfg.warmup_secs = 2;
        cfg.duration_secs = 3;
        let run = FailoverRun::new(cfg, RunMode::Direct, scripted()).unwrap();
        let (_tx, rx) = watch::channel(false);

        let report = run.execute(rx).await.unwrap();

        let path = &report.paths[0];
        assert!(path.dispatch.operations > path.snapshot.aggregate.attempted());
        assert!((2.9..3.6).contains(&report.measured_secs), "{}", report.measured_secs);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_run_records_load_input_after_warmup() {
        let mut cfg = config::config();
        cfg.warmup_secs = 2;
        cfg.duration_secs = 3;
        let mut run = FailoverRun::new(cfg, RunMode::Proxied, scripted()).unwrap();
        run.add_load_source(LoadSource {
            path: PathName::from("proxied"),
            reader: Box::new(&b"1,100\n4,300\n"[..]),
            parser: samples,
        })
        .unwrap();
        let (_tx, rx) = watch::channel(false);

        let report = tokio::spawn(run.execute(rx)).await.unwrap().unwrap();

        let proxied = report.path("proxied").unwrap();
        assert_eq!(proxied.load_summary.unwrap().events, 2);
        // The 1 s sample belongs to warm-up.
        let load = proxied.snapshot.aggregate.load.as_ref().unwrap();
        assert_eq!(load.samples, 1);
        assert_eq!(load.avg_tps, 300.0);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_on_direct_only_yields_full_reduction() {
        let mut cfg = config::config();
        cfg.probe.enabled = true;
        let factory: ConnectorFactory = Arc::new(|path: &AccessPath| {
            if path.kind == PathKind::Direct {
                // Time is paused, so this clock and the run's share an anchor.
                Arc::new(OutageConnector::new(
                    RunClock::start(),
                    Duration::from_secs(4),
                    Duration::from_secs(6),
                )) as Arc<dyn Connector>
            } else {
                Arc::new(ScriptedConnector::new()) as Arc<dyn Connector>
            }
        });
        let run = FailoverRun::new(cfg, RunMode::Both, factory).unwrap();
        let (_tx, rx) = watch::channel(false);

        let report = run.execute(rx).await.unwrap();

        let direct = report.path("direct").unwrap();
        assert_eq!(direct.snapshot.workload.summary.count, 1);
        assert!(direct.snapshot.probe.as_ref().unwrap().summary.count >= 1);
        let proxied = report.path("proxied").unwrap();
        assert_eq!(proxied.snapshot.workload.summary.count, 0);
        assert_eq!(
            report.comparison.unwrap().downtime_reduction_pct,
            Some(100.0)
        );
    }
}
