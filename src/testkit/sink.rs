//! In-memory [`OutcomeSink`].

use parking_lot::Mutex;

use crate::domain::{Observation, OperationOutcome, PathName};
use crate::port::outbound::sink::OutcomeSink;

/// Keeps every submission, in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<(PathName, OperationOutcome)>>,
    probes: Mutex<Vec<(PathName, Observation)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<(PathName, OperationOutcome)> {
        self.outcomes.lock().clone()
    }

    /// Outcomes for one path only.
    pub fn outcomes_for(&self, path: &str) -> Vec<OperationOutcome> {
        self.outcomes
            .lock()
            .iter()
            .filter(|(p, _)| p.as_str() == path)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn probes(&self) -> Vec<(PathName, Observation)> {
        self.probes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutcomeSink for RecordingSink {
    fn submit(&self, path: &PathName, outcome: &OperationOutcome) {
        self.outcomes.lock().push((path.clone(), outcome.clone()));
    }

    fn submit_probe(&self, path: &PathName, observation: Observation) {
        self.probes.lock().push((path.clone(), observation));
    }
}
