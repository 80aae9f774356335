//! Operation outcomes and failure classification.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::OperationKind;

/// Failure classification carried by a failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// I/O failure mid-operation, or no connection could be obtained.
    ConnectionLost,
    /// Lock wait or statement exceeded its bound.
    Timeout,
    /// Business-level rejection such as a unique key clash.
    ConstraintViolation,
    Other,
}

impl ErrorClass {
    pub const ALL: [Self; 4] = [
        Self::ConnectionLost,
        Self::Timeout,
        Self::ConstraintViolation,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection_lost",
            Self::Timeout => "timeout",
            Self::ConstraintViolation => "constraint_violation",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::ConnectionLost => 0,
            Self::Timeout => 1,
            Self::ConstraintViolation => 2,
            Self::Other => 3,
        }
    }

    /// Whether a connection that produced this failure must be discarded.
    ///
    /// After a client-side timeout the session state is unknown (a statement
    /// may still be running server-side), so it is treated like a lost link.
    #[must_use]
    pub const fn discards_connection(self) -> bool {
        matches!(self, Self::ConnectionLost | Self::Timeout)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one executed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` on success.
    pub error: Option<ErrorClass>,
    pub rows_affected: u64,
}

impl OperationOutcome {
    #[must_use]
    pub fn succeeded(
        kind: OperationKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        rows_affected: u64,
    ) -> Self {
        Self {
            kind,
            started_at,
            finished_at: finished_at.max(started_at),
            error: None,
            rows_affected,
        }
    }

    #[must_use]
    pub fn failed(
        kind: OperationKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        class: ErrorClass,
    ) -> Self {
        Self {
            kind,
            started_at,
            finished_at: finished_at.max(started_at),
            error: Some(class),
            rows_affected: 0,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Wall-clock duration from first statement sent to final acknowledgement.
    #[must_use]
    pub fn latency(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Whether the connection used for this operation may go back to the pool.
    #[must_use]
    pub fn keeps_connection(&self) -> bool {
        self.error.map_or(true, |class| !class.discards_connection())
    }
}

/// The part of an outcome the health state machine looks at.
///
/// Business operations and probes both reduce to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
}

impl Observation {
    #[must_use]
    pub const fn success(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            success: true,
        }
    }

    #[must_use]
    pub const fn failure(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at,
            success: false,
        }
    }
}

impl From<&OperationOutcome> for Observation {
    fn from(outcome: &OperationOutcome) -> Self {
        Self {
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            success: outcome.is_success(),
        }
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
    fn latency_is_end_minus_start() {
        let outcome = OperationOutcome::succeeded(OperationKind::Read, at(0), at(42), 1);
        assert_eq!(outcome.latency(), Duration::from_millis(42));
    }

    #[test]
    fn end_never_precedes_start() {
        let outcome = OperationOutcome::failed(OperationKind::Write, at(10), at(5), ErrorClass::Other);
        assert_eq!(outcome.finished_at, outcome.started_at);
        assert_eq!(outcome.latency(), Duration::ZERO);
    }

    #[test]
    fn connection_level_failures_discard_connection() {
        let lost = OperationOutcome::failed(OperationKind::Read, at(0), at(1), ErrorClass::ConnectionLost);
        let timeout = OperationOutcome::failed(OperationKind::Read, at(0), at(1), ErrorClass::Timeout);
        let clash = OperationOutcome::failed(
            OperationKind::Write,
            at(0),
            at(1),
            ErrorClass::ConstraintViolation,
        );
        assert!(!lost.keeps_connection());
        assert!(!timeout.keeps_connection());
        assert!(clash.keeps_connection());
    }

    #[test]
    fn observation_mirrors_outcome() {
        let outcome = OperationOutcome::failed(OperationKind::Transaction, at(3), at(9), ErrorClass::Timeout);
        let observation = Observation::from(&outcome);
        assert!(!observation.success);
        assert_eq!(observation.started_at, at(3));
        assert_eq!(observation.finished_at, at(9));
    }
}
