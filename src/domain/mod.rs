//! Failover-measurement domain types.
//!
//! Pure data and state machines. Nothing here performs I/O or takes a lock.

pub mod clock;
pub mod downtime;
pub mod health;
pub mod operation;
pub mod outcome;
pub mod path;

pub use clock::RunClock;
pub use downtime::{DowntimeInterval, DowntimeSummary};
pub use health::{HealthState, HealthTracker, Transition};
pub use operation::{OperationKind, OperationWeights};
pub use outcome::{ErrorClass, Observation, OperationOutcome};
pub use path::{AccessPath, Endpoint, PathKind, PathName, RunMode};
