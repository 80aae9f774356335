//! Per-run outcome sink and snapshot query surface.
//!
//! One [`RunRecorder`] is built per run and owns, for every access path, a
//! workload monitor, a probe monitor and a result aggregator. Each of those
//! has its own lock; the path map itself is fixed at construction, so paths
//! never contend with one another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::application::aggregator::{AggregateSnapshot, LoadEvent, ResultAggregator};
use crate::application::monitor::{DowntimeMonitor, MonitorSnapshot, SignalSource};
use crate::domain::{
    AccessPath, DowntimeInterval, HealthState, Observation, OperationOutcome, PathKind, PathName,
    RunClock,
};
use crate::port::outbound::sink::OutcomeSink;

#[derive(Debug, Clone, Copy)]
pub struct RecorderSettings {
    pub failure_threshold: u32,
    /// Keep a probe monitor per path.
    pub probe_enabled: bool,
    /// Start with recording paused until [`RunRecorder::start_recording`].
    pub warmup: bool,
}

/// Everything known about one path at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub path: PathName,
    pub kind: PathKind,
    pub state: HealthState,
    pub workload: MonitorSnapshot,
    pub probe: Option<MonitorSnapshot>,
    pub aggregate: AggregateSnapshot,
}

struct PathRecorder {
    name: PathName,
    kind: PathKind,
    workload: DowntimeMonitor,
    probe: Option<DowntimeMonitor>,
    aggregator: ResultAggregator,
}

impl PathRecorder {
    fn snapshot(&self, elapsed: Duration) -> RunSnapshot {
        let workload = self.workload.snapshot();
        RunSnapshot {
            path: self.name.clone(),
            kind: self.kind,
            state: workload.state,
            workload,
            probe: self.probe.as_ref().map(DowntimeMonitor::snapshot),
            aggregate: self.aggregator.snapshot(elapsed),
        }
    }
}

/// Implements [`OutcomeSink`] over per-path monitors and aggregators.
pub struct RunRecorder {
    clock: RunClock,
    order: Vec<PathName>,
    paths: HashMap<PathName, PathRecorder>,
    recording: AtomicBool,
    /// Clock offset at which recording started.
    measured_from: Mutex<Duration>,
}

impl RunRecorder {
    #[must_use]
    pub fn new(clock: RunClock, paths: &[AccessPath], settings: RecorderSettings) -> Self {
        let order: Vec<PathName> = paths.iter().map(|p| p.name.clone()).collect();
        let paths = paths
            .iter()
            .map(|p| {
                let recorder = PathRecorder {
                    name: p.name.clone(),
                    kind: p.kind,
                    workload: DowntimeMonitor::new(
                        p.name.clone(),
                        SignalSource::Workload,
                        settings.failure_threshold,
                    ),
                    probe: settings.probe_enabled.then(|| {
                        DowntimeMonitor::new(
                            p.name.clone(),
                            SignalSource::Probe,
                            settings.failure_threshold,
                        )
                    }),
                    aggregator: ResultAggregator::new(),
                };
                (p.name.clone(), recorder)
            })
            .collect();

        Self {
            clock,
            order,
            paths,
            recording: AtomicBool::new(!settings.warmup),
            measured_from: Mutex::new(Duration::ZERO),
        }
    }

    #[must_use]
    pub const fn clock(&self) -> &RunClock {
        &self.clock
    }

    /// Path names in configuration order.
    #[must_use]
    pub fn paths(&self) -> &[PathName] {
        &self.order
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// End of warm-up: outcomes from now on are recorded and TPS is measured
    /// from this instant.
    pub fn start_recording(&self) {
        *self.measured_from.lock() = self.clock.elapsed();
        self.recording.store(true, Ordering::Release);
    }

    /// Time since recording started.
    #[must_use]
    pub fn measured_elapsed(&self) -> Duration {
        self.clock.elapsed().saturating_sub(*self.measured_from.lock())
    }

    fn path(&self, path: &PathName) -> Option<&PathRecorder> {
        let found = self.paths.get(path);
        if found.is_none() {
            warn!(path = path.as_str(), "Result for unknown access path dropped");
        }
        found
    }

    /// Fold one external load-generator report, taken at `at`, into
    /// `path`'s snapshot.
    pub fn record_load(&self, path: &PathName, at: DateTime<Utc>, event: &LoadEvent) {
        // Stamps come from the generator's own offsets, so a report read after
        // warm-up may still describe a warm-up second.
        if !self.is_recording() || self.clock.offset_of(at) < *self.measured_from.lock() {
            return;
        }
        if let Some(recorder) = self.path(path) {
            recorder.aggregator.record_load(at, event);
        }
    }

    /// Workload downtime intervals for `path`, oldest first, including an
    /// open one. `None` for an unknown path.
    #[must_use]
    pub fn downtime_intervals(&self, path: &PathName) -> Option<Vec<DowntimeInterval>> {
        self.paths.get(path).map(|r| r.workload.intervals())
    }

    /// Probe downtime intervals, when probing is enabled.
    #[must_use]
    pub fn probe_intervals(&self, path: &PathName) -> Option<Vec<DowntimeInterval>> {
        self.paths
            .get(path)
            .and_then(|r| r.probe.as_ref())
            .map(DowntimeMonitor::intervals)
    }

    /// Live snapshot for one path.
    #[must_use]
    pub fn aggregate(&self, path: &PathName) -> Option<RunSnapshot> {
        let elapsed = self.measured_elapsed();
        self.paths.get(path).map(|r| r.snapshot(elapsed))
    }

    /// Snapshots for every path, in configuration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RunSnapshot> {
        let elapsed = self.measured_elapsed();
        self.order
            .iter()
            .filter_map(|name| self.paths.get(name))
            .map(|r| r.snapshot(elapsed))
            .collect()
    }

    /// Close every monitor at `at`. Open intervals become unresolved.
    pub fn finish(&self, at: DateTime<Utc>) {
        for recorder in self.paths.values() {
            recorder.workload.finish(at);
            if let Some(probe) = &recorder.probe {
                probe.finish(at);
            }
        }
    }
}

impl OutcomeSink for RunRecorder {
    fn submit(&self, path: &PathName, outcome: &OperationOutcome) {
        if !self.is_recording() {
            return;
        }
        if let Some(recorder) = self.path(path) {
            recorder.workload.observe(Observation::from(outcome));
            recorder.aggregator.record(outcome);
        }
    }

    fn submit_probe(&self, path: &PathName, observation: Observation) {
        if !self.is_recording() {
            return;
        }
        if let Some(probe) = self.path(path).and_then(|r| r.probe.as_ref()) {
            probe.observe(observation);
        }
    }
}
