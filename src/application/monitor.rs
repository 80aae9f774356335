//! Thread-safe downtime monitor for one access path and workload source.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    DowntimeInterval, DowntimeSummary, HealthState, HealthTracker, Observation, PathName,
    Transition,
};

/// Which stream of results feeds a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Business operations from the dispatcher.
    Workload,
    /// Connect-and-ping probe.
    Probe,
}

impl SignalSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workload => "workload",
            Self::Probe => "probe",
        }
    }
}

/// Point-in-time copy of a monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub source: SignalSource,
    pub state: HealthState,
    pub threshold: u32,
    pub consecutive_failures: u32,
    pub suppressed_blips: u64,
    /// Closed intervals, then the open one if the path is down.
    pub intervals: Vec<DowntimeInterval>,
    pub summary: DowntimeSummary,
}

/// Serialises observations from all workers on one path through a single
/// [`HealthTracker`].
///
/// Observations are applied in the order their callers take the lock, which
/// is the order results became available.
#[derive(Debug)]
pub struct DowntimeMonitor {
    path: PathName,
    source: SignalSource,
    tracker: Mutex<HealthTracker>,
}

impl DowntimeMonitor {
    #[must_use]
    pub fn new(path: PathName, source: SignalSource, threshold: u32) -> Self {
        Self {
            path,
            source,
            tracker: Mutex::new(HealthTracker::new(threshold)),
        }
    }

    #[must_use]
    pub const fn source(&self) -> SignalSource {
        self.source
    }

    /// Apply one observation and log any resulting transition.
    pub fn observe(&self, observation: Observation) -> Option<Transition> {
        let (transition, failures) = {
            let mut tracker = self.tracker.lock();
            let transition = tracker.observe(observation);
            (transition, tracker.consecutive_failures())
        };

        if let Some(transition) = &transition {
            self.log_transition(transition, failures);
        }
        transition
    }

    fn log_transition(&self, transition: &Transition, failures: u32) {
        let path = self.path.as_str();
        let source = self.source.as_str();
        match transition {
            Transition::Suspected { first_failure_at } => {
                debug!(path, source, %first_failure_at, "UP -> SUSPECT");
            }
            Transition::Cleared { failures } => {
                debug!(path, source, failures, "SUSPECT -> UP (transient)");
            }
            Transition::WentDown { started_at } => {
                warn!(path, source, failures, %started_at, "Path DOWN");
            }
            Transition::Recovered(interval) => {
                let duration_ms = interval.duration().unwrap_or_default().as_millis() as u64;
                info!(path, source, duration_ms, "Path recovered, DOWN -> UP");
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> HealthState {
        self.tracker.lock().state()
    }

    /// Closed intervals followed by the open one, if any.
    #[must_use]
    pub fn intervals(&self) -> Vec<DowntimeInterval> {
        self.tracker.lock().intervals()
    }

    #[must_use]
    pub fn summary(&self) -> DowntimeSummary {
        DowntimeSummary::from_intervals(self.tracker.lock().closed_intervals())
    }

    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        let tracker = self.tracker.lock();
        MonitorSnapshot {
            source: self.source,
            state: tracker.state(),
            threshold: tracker.threshold(),
            consecutive_failures: tracker.consecutive_failures(),
            suppressed_blips: tracker.suppressed_blips(),
            intervals: tracker.intervals(),
            summary: DowntimeSummary::from_intervals(tracker.closed_intervals()),
        }
    }

    /// Close the monitor at run end. A still-open interval is closed at
    /// `at` and flagged unresolved; later observations are ignored.
    pub fn finish(&self, at: DateTime<Utc>) -> Option<DowntimeInterval> {
        let closed = self.tracker.lock().finish(at);
        if let Some(interval) = &closed {
            warn!(
                path = self.path.as_str(),
                source = self.source.as_str(),
                started_at = %interval.started_at,
                "Run ended while DOWN, interval left unresolved"
            );
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn monitor(threshold: u32) -> DowntimeMonitor {
        DowntimeMonitor::new(PathName::from("direct"), SignalSource::Workload, threshold)
    }

    #[test]
    fn threshold_failures_then_success_yield_one_interval() {
        let monitor = monitor(3);
        monitor.observe(Observation::failure(at(100), at(150)));
        monitor.observe(Observation::failure(at(200), at(250)));
        assert_eq!(monitor.state(), HealthState::Suspect);
        monitor.observe(Observation::failure(at(300), at(350)));
        assert_eq!(monitor.state(), HealthState::Down);
        monitor.observe(Observation::success(at(400), at(420)));

        let intervals = monitor.intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].started_at, at(100));
        assert_eq!(intervals[0].ended_at, Some(at(420)));
        assert!(!intervals[0].unresolved);
    }

    #[test]
    fn live_query_includes_open_interval() {
        let monitor = monitor(1);
        monitor.observe(Observation::failure(at(0), at(10)));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.state, HealthState::Down);
        assert_eq!(snapshot.intervals.len(), 1);
        assert!(snapshot.intervals[0].is_open());
        assert_eq!(snapshot.summary.count, 0);
    }

    #[test]
    fn finish_closes_open_interval_as_unresolved() {
        let monitor = monitor(2);
        monitor.observe(Observation::failure(at(0), at(10)));
        monitor.observe(Observation::failure(at(20), at(30)));

        let closed = monitor.finish(at(5_000)).unwrap();
        assert!(closed.unresolved);
        assert_eq!(closed.ended_at, Some(at(5_000)));

        // Ignored after finish.
        assert!(monitor.observe(Observation::success(at(6_000), at(6_010))).is_none());
        assert_eq!(monitor.intervals(), vec![closed]);
    }

    #[test]
    fn concurrent_reporters_never_open_two_intervals() {
        let monitor = Arc::new(monitor(3));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for i in 0..500i64 {
                        let t = i * 10 + worker;
                        let observation = if (i / 20) % 2 == 0 {
                            Observation::failure(at(t), at(t + 5))
                        } else {
                            Observation::success(at(t), at(t + 5))
                        };
                        monitor.observe(observation);
                        let open = monitor.intervals().iter().filter(|i| i.is_open()).count();
                        assert!(open <= 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        monitor.finish(at(100_000));
        let intervals = monitor.intervals();
        assert!(intervals.iter().all(|i| !i.is_open()));
        assert!(intervals
            .iter()
            .all(|i| i.ended_at.is_some_and(|end| end >= i.started_at)));
    }
}
