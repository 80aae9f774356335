//! Per-path health state machine.
//!
//! Consumes [`Observation`]s in arrival order and derives downtime intervals:
//!
//! ```text
//!   UP --failure--> SUSPECT --failure x (threshold-1)--> DOWN
//!    ^                 |                                  |
//!    +----success------+                                  |
//!    +-------------------------success--------------------+
//! ```
//!
//! A single success in `SUSPECT` is a transient blip and records nothing.
//! Reaching the consecutive-failure threshold opens an interval that starts at
//! the *first* failure's start time; the next success closes it at that
//! success's end time.
//!
//! This type holds no lock; the application layer wraps it in a monitor
//! that serialises concurrent reporters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::downtime::DowntimeInterval;
use super::outcome::Observation;

/// Externally visible health of one access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    Up,
    /// Failures seen, but fewer than the threshold.
    Suspect,
    /// Threshold reached; a downtime interval is open.
    Down,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Suspect => "SUSPECT",
            Self::Down => "DOWN",
        })
    }
}

/// State change caused by a single observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// UP → SUSPECT.
    Suspected { first_failure_at: DateTime<Utc> },
    /// SUSPECT → UP without an interval.
    Cleared { failures: u32 },
    /// → DOWN; an interval opened at `started_at`.
    WentDown { started_at: DateTime<Utc> },
    /// DOWN → UP; the closed interval.
    Recovered(DowntimeInterval),
}

#[derive(Debug, Clone)]
enum Phase {
    Up,
    Suspect {
        first_failure_at: DateTime<Utc>,
        consecutive: u32,
    },
    Down {
        open: DowntimeInterval,
        consecutive: u32,
    },
}

/// Health state machine for one workload source on one access path.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    threshold: u32,
    phase: Phase,
    closed: Vec<DowntimeInterval>,
    blips: u64,
    finished: bool,
}

impl HealthTracker {
    /// Create a tracker in `UP`.
    ///
    /// A `threshold` of 0 is treated as 1; configuration validation rejects
    /// it earlier.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            phase: Phase::Up,
            closed: Vec::new(),
            blips: 0,
            finished: false,
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub const fn state(&self) -> HealthState {
        match self.phase {
            Phase::Up => HealthState::Up,
            Phase::Suspect { .. } => HealthState::Suspect,
            Phase::Down { .. } => HealthState::Down,
        }
    }

    /// Current run of failures in arrival order.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        match self.phase {
            Phase::Up => 0,
            Phase::Suspect { consecutive, .. } | Phase::Down { consecutive, .. } => consecutive,
        }
    }

    /// SUSPECT → UP transitions seen so far.
    #[must_use]
    pub const fn suppressed_blips(&self) -> u64 {
        self.blips
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Closed intervals, oldest first.
    #[must_use]
    pub fn closed_intervals(&self) -> &[DowntimeInterval] {
        &self.closed
    }

    #[must_use]
    pub fn open_interval(&self) -> Option<&DowntimeInterval> {
        match &self.phase {
            Phase::Down { open, .. } => Some(open),
            _ => None,
        }
    }

    /// Closed intervals followed by the open one, if any.
    #[must_use]
    pub fn intervals(&self) -> Vec<DowntimeInterval> {
        let mut all = self.closed.clone();
        all.extend(self.open_interval().cloned());
        all
    }

    /// Apply one observation. Observations after [`finish`](Self::finish)
    /// are ignored.
    pub fn observe(&mut self, observation: Observation) -> Option<Transition> {
        if self.finished {
            return None;
        }

        let phase = std::mem::replace(&mut self.phase, Phase::Up);
        let (next, transition) = match (phase, observation.success) {
            (Phase::Up, true) => (Phase::Up, None),
            (Phase::Up, false) => self.fail_from(observation.started_at, 1),
            (
                Phase::Suspect {
                    first_failure_at,
                    consecutive,
                },
                false,
            ) => self.fail_from(first_failure_at, consecutive.saturating_add(1)),
            (Phase::Suspect { consecutive, .. }, true) => {
                self.blips += 1;
                (
                    Phase::Up,
                    Some(Transition::Cleared {
                        failures: consecutive,
                    }),
                )
            }
            (Phase::Down { open, consecutive }, false) => (
                Phase::Down {
                    open,
                    consecutive: consecutive.saturating_add(1),
                },
                None,
            ),
            (Phase::Down { open, .. }, true) => {
                let closed = open.close(observation.finished_at, false);
                self.closed.push(closed.clone());
                (Phase::Up, Some(Transition::Recovered(closed)))
            }
        };
        self.phase = next;
        transition
    }

    /// Failure bookkeeping shared by UP and SUSPECT.
    fn fail_from(
        &self,
        first_failure_at: DateTime<Utc>,
        consecutive: u32,
    ) -> (Phase, Option<Transition>) {
        if consecutive >= self.threshold {
            return (
                Phase::Down {
                    open: DowntimeInterval::open(first_failure_at),
                    consecutive,
                },
                Some(Transition::WentDown {
                    started_at: first_failure_at,
                }),
            );
        }

        let transition = (consecutive == 1).then_some(Transition::Suspected { first_failure_at });
        (
            Phase::Suspect {
                first_failure_at,
                consecutive,
            },
            transition,
        )
    }

    /// End of run: close a still-open interval at `at` and flag it unresolved.
    ///
    /// Returns the interval closed this way. Idempotent.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Option<DowntimeInterval> {
        if self.finished {
            return None;
        }
        self.finished = true;

        match std::mem::replace(&mut self.phase, Phase::Up) {
            Phase::Down { open, .. } => {
                let closed = open.close(at, true);
                self.closed.push(closed.clone());
                Some(closed)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn fail(start: i64, end: i64) -> Observation {
        Observation::failure(at(start), at(end))
    }

    fn ok(start: i64, end: i64) -> Observation {
        Observation::success(at(start), at(end))
    }

    #[test]
    fn starts_up_with_no_intervals() {
        let tracker = HealthTracker::new(3);
        assert_eq!(tracker.state(), HealthState::Up);
        assert!(tracker.intervals().is_empty());
    }

    #[test]
    fn single_failure_then_success_is_a_blip() {
        let mut tracker = HealthTracker::new(3);

        assert_eq!(
            tracker.observe(fail(0, 10)),
            Some(Transition::Suspected {
                first_failure_at: at(0)
            })
        );
        assert_eq!(tracker.state(), HealthState::Suspect);
        assert_eq!(
            tracker.observe(ok(20, 30)),
            Some(Transition::Cleared { failures: 1 })
        );

        assert_eq!(tracker.state(), HealthState::Up);
        assert!(tracker.intervals().is_empty());
        assert_eq!(tracker.suppressed_blips(), 1);
    }

    #[test]
    fn below_threshold_stays_suspect() {
        let mut tracker = HealthTracker::new(3);
        tracker.observe(fail(0, 10));
        assert_eq!(tracker.observe(fail(20, 30)), None);
        assert_eq!(tracker.state(), HealthState::Suspect);
        assert_eq!(tracker.consecutive_failures(), 2);
    }

    #[test]
    fn threshold_failures_then_success_yields_one_interval() {
        let mut tracker = HealthTracker::new(3);
        tracker.observe(fail(100, 150));
        tracker.observe(fail(200, 260));
        assert_eq!(
            tracker.observe(fail(300, 340)),
            Some(Transition::WentDown { started_at: at(100) })
        );
        assert_eq!(tracker.state(), HealthState::Down);

        let transition = tracker.observe(ok(2_000, 2_050));
        let intervals = tracker.intervals();
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].started_at, at(100));
        assert_eq!(intervals[0].ended_at, Some(at(2_050)));
        assert!(!intervals[0].unresolved);
        assert_eq!(transition, Some(Transition::Recovered(intervals[0].clone())));
        assert_eq!(tracker.state(), HealthState::Up);
    }

    #[test]
    fn failures_while_down_keep_interval_open() {
        let mut tracker = HealthTracker::new(2);
        tracker.observe(fail(0, 1));
        tracker.observe(fail(2, 3));
        for i in 0..10 {
            assert_eq!(tracker.observe(fail(10 + i, 11 + i)), None);
        }
        assert_eq!(tracker.state(), HealthState::Down);
        assert!(tracker.open_interval().is_some());
        assert!(tracker.closed_intervals().is_empty());
    }

    #[test]
    fn first_failure_start_follows_arrival_order() {
        // A failure that started earlier but arrived later does not move the
        // interval start.
        let mut tracker = HealthTracker::new(2);
        tracker.observe(fail(500, 510));
        tracker.observe(fail(100, 520));
        assert_eq!(tracker.open_interval().map(|i| i.started_at), Some(at(500)));
    }

    #[test]
    fn threshold_one_goes_down_immediately() {
        let mut tracker = HealthTracker::new(1);
        assert_eq!(
            tracker.observe(fail(0, 5)),
            Some(Transition::WentDown { started_at: at(0) })
        );
        assert_eq!(tracker.state(), HealthState::Down);
    }

    #[test]
    fn zero_threshold_is_clamped_to_one() {
        assert_eq!(HealthTracker::new(0).threshold(), 1);
    }

    #[test]
    fn finish_while_down_closes_unresolved() {
        let mut tracker = HealthTracker::new(3);
        for i in 0..5 {
            tracker.observe(fail(i * 100, i * 100 + 10));
        }
        let closed = tracker.finish(at(10_000)).expect("open interval closed");
        assert!(closed.unresolved);
        assert_eq!(closed.started_at, at(0));
        assert_eq!(closed.ended_at, Some(at(10_000)));

        let intervals = tracker.intervals();
        assert_eq!(intervals.len(), 1);
        assert!(intervals[0].unresolved);
        assert!(tracker.finish(at(20_000)).is_none());
    }

    #[test]
    fn finish_while_suspect_records_nothing() {
        let mut tracker = HealthTracker::new(3);
        tracker.observe(fail(0, 10));
        assert!(tracker.finish(at(100)).is_none());
        assert!(tracker.intervals().is_empty());
    }

    #[test]
    fn observations_after_finish_are_ignored() {
        let mut tracker = HealthTracker::new(1);
        tracker.finish(at(0));
        assert_eq!(tracker.observe(fail(10, 20)), None);
        assert_eq!(tracker.state(), HealthState::Up);
    }

    #[test]
    fn repeated_outages_append_intervals_in_order() {
        let mut tracker = HealthTracker::new(2);
        tracker.observe(fail(0, 1));
        tracker.observe(fail(2, 3));
        tracker.observe(ok(1_000, 1_001));
        tracker.observe(fail(5_000, 5_001));
        tracker.observe(fail(5_002, 5_003));
        tracker.observe(ok(6_000, 6_010));

        let intervals = tracker.intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].duration(), Some(std::time::Duration::from_millis(1_001)));
        assert_eq!(intervals[1].started_at, at(5_000));
        assert!(intervals[0].started_at < intervals[1].started_at);
    }

    #[test]
    fn random_sequences_never_hold_more_than_one_open_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut tracker = HealthTracker::new(rng.gen_range(1..5));
            let mut clock = 0;
            for _ in 0..200 {
                let start = clock;
                clock += rng.gen_range(1..50);
                let observation = if rng.gen_bool(0.4) {
                    fail(start, clock)
                } else {
                    ok(start, clock)
                };
                tracker.observe(observation);

                let open = tracker.intervals().iter().filter(|i| i.is_open()).count();
                assert!(open <= 1);
                assert_eq!(open == 1, tracker.state() == HealthState::Down);
                for interval in tracker.closed_intervals() {
                    assert!(interval.ended_at.unwrap() >= interval.started_at);
                }
            }
        }
    }
}
