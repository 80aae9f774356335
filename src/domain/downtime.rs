//! Downtime intervals and their summary statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A measured span during which an access path was judged unavailable.
///
/// Half-open `[started_at, ended_at)`. While the failure is ongoing
/// `ended_at` is `None`; once closed the interval is never modified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeInterval {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Closed at run end rather than by an observed recovery.
    pub unresolved: bool,
}

impl DowntimeInterval {
    pub(crate) fn open(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
            unresolved: false,
        }
    }

    /// Close at `ended_at`, clamped so the end never precedes the start.
    pub(crate) fn close(mut self, ended_at: DateTime<Utc>, unresolved: bool) -> Self {
        self.ended_at = Some(ended_at.max(self.started_at));
        self.unresolved = unresolved;
        self
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of a closed interval; `None` while open.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .map(|end| (end - self.started_at).to_std().unwrap_or_default())
    }

    /// Length so far, measuring an open interval up to `now`.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}

/// Aggregate view over the closed intervals of one monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DowntimeSummary {
    pub count: usize,
    pub unresolved: usize,
    #[serde(with = "secs_f64")]
    pub total: Duration,
    #[serde(with = "secs_f64")]
    pub mean: Duration,
    #[serde(with = "secs_f64")]
    pub max: Duration,
    #[serde(with = "secs_f64")]
    pub min: Duration,
}

impl DowntimeSummary {
    /// Summarise closed intervals; open ones are skipped.
    #[must_use]
    pub fn from_intervals(intervals: &[DowntimeInterval]) -> Self {
        let durations: Vec<Duration> = intervals.iter().filter_map(DowntimeInterval::duration).collect();
        if durations.is_empty() {
            return Self::default();
        }

        let total: Duration = durations.iter().sum();
        Self {
            count: durations.len(),
            unresolved: intervals.iter().filter(|i| i.unresolved).count(),
            total,
            mean: total / durations.len() as u32,
            max: durations.iter().copied().max().unwrap_or_default(),
            min: durations.iter().copied().min().unwrap_or_default(),
        }
    }
}

/// Serialize durations as fractional seconds for reports.
pub(crate) mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn close_clamps_end_to_start() {
        let interval = DowntimeInterval::open(at(500)).close(at(100), false);
        assert_eq!(interval.ended_at, Some(at(500)));
        assert_eq!(interval.duration(), Some(Duration::ZERO));
    }

    #[test]
    fn open_interval_has_no_duration_but_elapses() {
        let interval = DowntimeInterval::open(at(0));
        assert!(interval.is_open());
        assert_eq!(interval.duration(), None);
        assert_eq!(interval.elapsed(at(1_500)), Duration::from_millis(1_500));
    }

    #[test]
    fn summary_skips_open_intervals() {
        let intervals = vec![
            DowntimeInterval::open(at(0)).close(at(2_000), false),
            DowntimeInterval::open(at(5_000)).close(at(6_000), true),
            DowntimeInterval::open(at(9_000)),
        ];
        let summary = DowntimeSummary::from_intervals(&intervals);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.total, Duration::from_secs(3));
        assert_eq!(summary.mean, Duration::from_millis(1_500));
        assert_eq!(summary.max, Duration::from_secs(2));
        assert_eq!(summary.min, Duration::from_secs(1));
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(DowntimeSummary::from_intervals(&[]), DowntimeSummary::default());
    }
}
