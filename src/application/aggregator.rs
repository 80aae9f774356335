//! Running per-path aggregates of operation outcomes.
//!
//! Each path owns one [`ResultAggregator`]. `record` takes the lock once per
//! outcome; `snapshot` copies the counters out under the lock and does the
//! percentile work after releasing it, so reporting never stalls workers for
//! longer than a copy.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::{ErrorClass, OperationKind, OperationOutcome};

/// Latency samples retained for percentile estimates.
pub const LATENCY_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, Default)]
struct KindCounters {
    attempted: u64,
    succeeded: u64,
    failures: [u64; 4],
}

#[derive(Debug, Clone, Default)]
struct LatencyAccumulator {
    count: u64,
    sum: Duration,
    min: Option<Duration>,
    max: Duration,
    recent: VecDeque<Duration>,
}

impl LatencyAccumulator {
    fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.sum += latency;
        self.min = Some(self.min.map_or(latency, |m| m.min(latency)));
        self.max = self.max.max(latency);
        if self.recent.len() == LATENCY_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(latency);
    }
}

/// One report from an external load generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadEvent {
    /// Periodic throughput sample; `failed` counts errors in the period.
    /// `offset` is the generator's own elapsed time at the sample, when it
    /// prints one.
    Progress {
        offset: Option<Duration>,
        tps: f64,
        latency_ms: Option<f64>,
        failed: u64,
    },
    /// End-of-run throughput.
    Final { tps: f64 },
    /// One error line.
    Error,
}

#[derive(Debug, Clone, Copy, Default)]
struct LoadAccumulator {
    samples: u64,
    tps_sum: f64,
    tps_min: Option<f64>,
    tps_max: f64,
    latency_samples: u64,
    latency_sum_ms: f64,
    latency_min_ms: Option<f64>,
    latency_max_ms: f64,
    errors: u64,
    final_tps: Option<f64>,
    last_at: Option<DateTime<Utc>>,
}

impl LoadAccumulator {
    fn record(&mut self, at: DateTime<Utc>, event: &LoadEvent) {
        match *event {
            LoadEvent::Progress {
                tps,
                latency_ms,
                failed,
                ..
            } => {
                self.samples += 1;
                self.tps_sum += tps;
                self.tps_min = Some(self.tps_min.map_or(tps, |v| v.min(tps)));
                self.tps_max = self.tps_max.max(tps);
                if let Some(latency) = latency_ms {
                    self.latency_samples += 1;
                    self.latency_sum_ms += latency;
                    self.latency_min_ms =
                        Some(self.latency_min_ms.map_or(latency, |v| v.min(latency)));
                    self.latency_max_ms = self.latency_max_ms.max(latency);
                }
                self.errors += failed;
            }
            LoadEvent::Final { tps } => self.final_tps = Some(tps),
            LoadEvent::Error => self.errors += 1,
        }
        self.last_at = Some(self.last_at.map_or(at, |prev| prev.max(at)));
    }

    fn snapshot(&self) -> Option<LoadSnapshot> {
        self.last_at?;
        let avg = |sum: f64, n: u64| if n == 0 { 0.0 } else { sum / n as f64 };
        Some(LoadSnapshot {
            samples: self.samples,
            avg_tps: avg(self.tps_sum, self.samples),
            min_tps: self.tps_min.unwrap_or_default(),
            max_tps: self.tps_max,
            avg_latency_ms: avg(self.latency_sum_ms, self.latency_samples),
            min_latency_ms: self.latency_min_ms.unwrap_or_default(),
            max_latency_ms: self.latency_max_ms,
            errors: self.errors,
            final_tps: self.final_tps,
            last_at: self.last_at,
        })
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    kinds: [KindCounters; 3],
    latency: LatencyAccumulator,
    completed: u64,
    load: LoadAccumulator,
}

/// Failures by class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub connection_lost: u64,
    pub timeout: u64,
    pub constraint_violation: u64,
    pub other: u64,
}

impl FailureCounts {
    fn from_array(counts: [u64; 4]) -> Self {
        Self {
            connection_lost: counts[ErrorClass::ConnectionLost.index()],
            timeout: counts[ErrorClass::Timeout.index()],
            constraint_violation: counts[ErrorClass::ConstraintViolation.index()],
            other: counts[ErrorClass::Other.index()],
        }
    }

    #[must_use]
    pub const fn get(&self, class: ErrorClass) -> u64 {
        match class {
            ErrorClass::ConnectionLost => self.connection_lost,
            ErrorClass::Timeout => self.timeout,
            ErrorClass::ConstraintViolation => self.constraint_violation,
            ErrorClass::Other => self.other,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.connection_lost + self.timeout + self.constraint_violation + self.other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindSnapshot {
    pub kind: OperationKind,
    pub attempted: u64,
    pub succeeded: u64,
    pub failures: FailureCounts,
}

impl KindSnapshot {
    /// `succeeded / attempted`, or 0 when nothing was attempted.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        ratio(self.succeeded, self.attempted)
    }
}

/// Latency statistics in milliseconds. Percentiles cover the most recent
/// [`LATENCY_WINDOW`] samples only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Folded load-generator measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadSnapshot {
    pub samples: u64,
    pub avg_tps: f64,
    pub min_tps: f64,
    pub max_tps: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub errors: u64,
    pub final_tps: Option<f64>,
    pub last_at: Option<DateTime<Utc>>,
}

/// Immutable copy of one path's aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub kinds: Vec<KindSnapshot>,
    pub completed: u64,
    pub elapsed_secs: f64,
    pub tps: f64,
    pub latency: LatencySnapshot,
    /// Present once a load generator has reported.
    pub load: Option<LoadSnapshot>,
}

impl AggregateSnapshot {
    #[must_use]
    pub fn kind(&self, kind: OperationKind) -> Option<&KindSnapshot> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.kinds.iter().map(|k| k.attempted).sum()
    }

    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.kinds.iter().map(|k| k.succeeded).sum()
    }

    /// Overall success rate; 0 when nothing was attempted.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        ratio(self.succeeded(), self.attempted())
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Percentile of a sorted slice; zero when empty.
fn percentile(samples: &[Duration], p: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let index = ((samples.len() as f64 - 1.0) * p).round() as usize;
    samples[index.min(samples.len() - 1)]
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Per-path outcome counters.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    state: Mutex<AggregateState>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &OperationOutcome) {
        let latency = outcome.latency();
        let mut state = self.state.lock();
        let counters = &mut state.kinds[outcome.kind.index()];
        counters.attempted += 1;
        match outcome.error {
            None => counters.succeeded += 1,
            Some(class) => counters.failures[class.index()] += 1,
        }
        state.latency.record(latency);
        state.completed += 1;
    }

    /// Fold one external load-generator report received at `at`.
    pub fn record_load(&self, at: DateTime<Utc>, event: &LoadEvent) {
        self.state.lock().load.record(at, event);
    }

    /// Copy current aggregates; `elapsed` is the measured time so far and
    /// drives TPS.
    #[must_use]
    pub fn snapshot(&self, elapsed: Duration) -> AggregateSnapshot {
        let (kinds, latency, completed, load) = {
            let state = self.state.lock();
            (
                state.kinds,
                state.latency.clone(),
                state.completed,
                state.load,
            )
        };

        let mut recent: Vec<Duration> = latency.recent.into_iter().collect();
        recent.sort_unstable();
        let mean_ms = if latency.count == 0 {
            0.0
        } else {
            millis(latency.sum) / latency.count as f64
        };

        let elapsed_secs = elapsed.as_secs_f64();
        AggregateSnapshot {
            kinds: OperationKind::ALL
                .iter()
                .map(|&kind| {
                    let c = kinds[kind.index()];
                    KindSnapshot {
                        kind,
                        attempted: c.attempted,
                        succeeded: c.succeeded,
                        failures: FailureCounts::from_array(c.failures),
                    }
                })
                .collect(),
            completed,
            elapsed_secs,
            tps: if elapsed_secs > 0.0 {
                completed as f64 / elapsed_secs
            } else {
                0.0
            },
            latency: LatencySnapshot {
                count: latency.count,
                mean_ms,
                min_ms: millis(latency.min.unwrap_or_default()),
                max_ms: millis(latency.max),
                p50_ms: millis(percentile(&recent, 0.50)),
                p95_ms: millis(percentile(&recent, 0.95)),
                p99_ms: millis(percentile(&recent, 0.99)),
            },
            load: load.snapshot(),
        }
    }
}
