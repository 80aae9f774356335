//! Outcome sink port.

use crate::domain::{Observation, OperationOutcome, PathName};

/// Where executed operations and probe results are reported.
///
/// Safe for concurrent callers. Within one path, calls are applied in the
/// order they arrive; there is no ordering across paths.
pub trait OutcomeSink: Send + Sync {
    /// Report a business-operation outcome.
    fn submit(&self, path: &PathName, outcome: &OperationOutcome);

    /// Report a lightweight probe result.
    ///
    /// Probe results feed a separate health monitor from business outcomes
    /// so the two never share a consecutive-failure count.
    fn submit_probe(&self, path: &PathName, observation: Observation);
}
