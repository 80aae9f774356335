//! Connection pool internal state types.

use std::sync::atomic::AtomicU64;

use crate::port::outbound::database::Session;

/// Shared counters updated atomically by callers and replacement tasks.
pub(super) struct SharedCounters {
    /// Connections discarded after a connection-level failure.
    pub(super) discarded: AtomicU64,
    /// Replacement connections successfully established.
    pub(super) replacements: AtomicU64,
    /// Failed replacement attempts (each one is retried).
    pub(super) replacement_failures: AtomicU64,
    /// `acquire()` calls that gave up after the bounded wait.
    pub(super) exhausted: AtomicU64,
}

impl SharedCounters {
    pub(super) fn new() -> Self {
        Self {
            discarded: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
            replacement_failures: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        }
    }
}

/// An idle session and its id for logging.
pub(super) struct PooledSession {
    pub(super) id: u64,
    pub(super) session: Box<dyn Session>,
}
