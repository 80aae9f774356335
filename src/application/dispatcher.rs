//! Worker tasks that keep one access path busy.
//!
//! Each worker loops until the horizon or a stop signal: pick a kind by
//! weight, borrow a connection, execute, release, report, sleep a random
//! pacing interval. Stopping only prevents new iterations; an operation
//! already in flight runs to completion or to its own timeout.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::executor::OperationExecutor;
use crate::domain::{ErrorClass, OperationOutcome, PathName};
use crate::error::PoolError;
use crate::infrastructure::pool::ConnectionPool;
use crate::port::outbound::sink::OutcomeSink;

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    pub workers: usize,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    /// Worker `n` seeds its RNG with `seed + n`; entropy when absent.
    pub seed: Option<u64>,
    /// Run-clock offset after which no new iteration starts.
    pub horizon: Duration,
}

/// Totals reported by the workers of one path when they stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub workers: usize,
    pub operations: u64,
    pub failures: u64,
    pub exhausted: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerStats {
    operations: u64,
    failures: u64,
    exhausted: u64,
}

struct WorkerContext {
    path: PathName,
    pool: Arc<ConnectionPool>,
    executor: Arc<OperationExecutor>,
    sink: Arc<dyn OutcomeSink>,
    settings: DispatcherSettings,
    deadline: Instant,
}

/// Runs a fixed number of workers against one path's pool.
pub struct ConcurrentDispatcher {
    ctx: Arc<WorkerContext>,
}

impl ConcurrentDispatcher {
    #[must_use]
    pub fn new(
        path: PathName,
        pool: Arc<ConnectionPool>,
        executor: Arc<OperationExecutor>,
        sink: Arc<dyn OutcomeSink>,
        settings: DispatcherSettings,
    ) -> Self {
        let deadline = executor.clock().monotonic_anchor() + settings.horizon;
        Self {
            ctx: Arc::new(WorkerContext {
                path,
                pool,
                executor,
                sink,
                settings,
                deadline,
            }),
        }
    }

    /// Spawn the workers and wait for all of them to stop.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> DispatchSummary {
        let handles: Vec<_> = (0..self.ctx.settings.workers)
            .map(|worker| tokio::spawn(worker_loop(Arc::clone(&self.ctx), worker, stop.clone())))
            .collect();

        let mut summary = DispatchSummary {
            workers: self.ctx.settings.workers,
            ..DispatchSummary::default()
        };
        for result in join_all(handles).await {
            match result {
                Ok(stats) => {
                    summary.operations += stats.operations;
                    summary.failures += stats.failures;
                    summary.exhausted += stats.exhausted;
                }
                Err(e) => warn!(path = %self.ctx.path, error = %e, "Worker task failed"),
            }
        }
        debug!(
            path = %self.ctx.path,
            operations = summary.operations,
            failures = summary.failures,
            "Dispatcher stopped"
        );
        summary
    }
}

fn rng_for(seed: Option<u64>, worker: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
        None => StdRng::from_entropy(),
    }
}

async fn worker_loop(
    ctx: Arc<WorkerContext>,
    worker: usize,
    mut stop: watch::Receiver<bool>,
) -> WorkerStats {
    let mut rng = rng_for(ctx.settings.seed, worker);
    let mut stats = WorkerStats::default();
    let clock = *ctx.executor.clock();
    let (pacing_min, pacing_max) = (ctx.settings.pacing_min, ctx.settings.pacing_max);
    debug!(path = %ctx.path, worker, "Worker started");

    loop {
        if *stop.borrow() || Instant::now() >= ctx.deadline {
            break;
        }

        let kind = ctx.executor.catalog().pick_kind(&mut rng);
        let started_at = clock.now();
        let outcome = match ctx.pool.acquire().await {
            Ok(mut conn) => {
                let outcome = ctx.executor.execute(&mut conn, kind, &mut rng).await;
                ctx.pool.release(conn, outcome.keeps_connection());
                outcome
            }
            Err(PoolError::Exhausted { waited, .. }) => {
                stats.exhausted += 1;
                debug!(
                    path = %ctx.path,
                    worker,
                    kind = %kind,
                    waited_ms = waited.as_millis() as u64,
                    "No connection available"
                );
                OperationOutcome::failed(kind, started_at, clock.now(), ErrorClass::ConnectionLost)
            }
            Err(PoolError::Closed { .. }) => break,
        };

        stats.operations += 1;
        if !outcome.is_success() {
            stats.failures += 1;
        }
        ctx.sink.submit(&ctx.path, &outcome);

        let pause_ms = rng.gen_range(pacing_min.as_millis() as u64..=pacing_max.as_millis() as u64);
        let wake = (Instant::now() + Duration::from_millis(pause_ms)).min(ctx.deadline);
        tokio::select! {
            () = tokio::time::sleep_until(wake) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(path = %ctx.path, worker, operations = stats.operations, "Worker stopped");
    stats
}
