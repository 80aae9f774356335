//! Fixed-size pool of database sessions for one access path.
//!
//! # Architecture
//!
//! Idle sessions live in a queue guarded by a short-lived lock. A semaphore
//! whose permit count always equals the number of idle sessions lets callers
//! wait for one without polling; the wait is bounded by `acquire_timeout`,
//! after which the caller gets [`PoolError::Exhausted`].
//!
//! A session released as unhealthy is dropped and a background task opens a
//! replacement, retrying with exponential backoff until it succeeds or the
//! pool shuts down. The pool therefore drifts back to its configured size
//! without ever shrinking permanently. Replacement failures are only visible
//! to callers as continued exhaustion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::PathName;
use crate::error::{ConfigError, PoolError, Result, SessionError};
use crate::infrastructure::config::pool::ReconnectionConfig;
use crate::port::outbound::database::{Connector, Session, Statement};

mod replace;
mod state;

use replace::spawn_replacement;
use state::{PooledSession, SharedCounters};

/// Sizing and timing for one pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub size: usize,
    pub acquire_timeout: Duration,
    pub reconnection: ReconnectionConfig,
}

/// Runtime statistics for status lines and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub idle: usize,
    pub discarded: u64,
    pub replacements: u64,
    pub replacement_failures: u64,
    pub exhausted: u64,
    pub pending_replacements: usize,
}

pub(crate) struct PoolInner {
    path: PathName,
    settings: PoolSettings,
    connector: Arc<dyn Connector>,
    idle: Mutex<VecDeque<PooledSession>>,
    /// One permit per idle session.
    available: Semaphore,
    counters: SharedCounters,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl PoolInner {
    fn next_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn is_closed(&self) -> bool {
        self.available.is_closed()
    }

    /// Park a session for reuse. Closing happens under the same lock, so a
    /// session pushed concurrently with `shutdown` is dropped, never parked.
    fn push_idle(&self, pooled: PooledSession) {
        let mut idle = self.idle.lock();
        if self.is_closed() {
            return;
        }
        idle.push_back(pooled);
        self.available.add_permits(1);
    }

    fn discard(self: &Arc<Self>, id: u64) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(path = %self.path, connection_id = id, "Discarding connection");
        spawn_replacement(self);
    }
}

/// A session lent to exactly one worker.
///
/// Hand it back with [`ConnectionPool::release`]. Dropping it without
/// releasing counts as an unhealthy release.
pub struct PooledConnection {
    id: u64,
    session: Option<Box<dyn Session>>,
    pool: Weak<PoolInner>,
}

impl PooledConnection {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    fn released() -> SessionError {
        SessionError::ConnectionLost("connection already released".to_string())
    }
}

/// Delegates to the borrowed session so callers can hand `&mut conn`
/// straight to anything expecting a [`Session`].
#[async_trait]
impl Session for PooledConnection {
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<u64, SessionError> {
        match self.session.as_deref_mut() {
            Some(session) => session.execute(statement).await,
            None => Err(Self::released()),
        }
    }

    async fn transaction(
        &mut self,
        statements: &[Statement],
    ) -> std::result::Result<u64, SessionError> {
        match self.session.as_deref_mut() {
            Some(session) => session.transaction(statements).await,
            None => Err(Self::released()),
        }
    }

    async fn ping(&mut self) -> std::result::Result<(), SessionError> {
        match self.session.as_deref_mut() {
            Some(session) => session.ping().await,
            None => Err(Self::released()),
        }
    }

    fn is_closed(&self) -> bool {
        self.session.as_ref().map_or(true, |session| session.is_closed())
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.session.take().is_none() {
            return;
        }
        if let Some(pool) = self.pool.upgrade() {
            pool.discard(self.id);
        }
    }
}

/// Fixed-size session pool for one access path.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open a pool and fill it on a best-effort basis.
    ///
    /// Connections that fail to open initially are handed to replacement
    /// tasks, so a pool created while the database is unreachable still
    /// fills once it comes back.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` or `acquire_timeout` is zero.
    #[allow(clippy::result_large_err)]
    pub async fn open(
        path: PathName,
        connector: Arc<dyn Connector>,
        settings: PoolSettings,
    ) -> Result<Self> {
        Self::validate_settings(&settings)?;

        let size = settings.size;
        let inner = Arc::new(PoolInner {
            path,
            settings,
            connector,
            idle: Mutex::new(VecDeque::with_capacity(size)),
            available: Semaphore::new(0),
            counters: SharedCounters::new(),
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        });

        let attempts = join_all((0..size).map(|_| inner.connector.connect())).await;
        let mut established = 0usize;
        for attempt in attempts {
            match attempt {
                Ok(session) => {
                    let id = inner.next_connection_id();
                    inner.push_idle(PooledSession { id, session });
                    established += 1;
                }
                Err(e) => {
                    warn!(path = %inner.path, error = %e, "Initial connection failed, retrying in background");
                    spawn_replacement(&inner);
                }
            }
        }

        info!(
            path = %inner.path,
            target = %inner.connector.target(),
            established,
            size,
            "Connection pool opened"
        );
        Ok(Self { inner })
    }

    #[allow(clippy::result_large_err)]
    fn validate_settings(settings: &PoolSettings) -> Result<()> {
        if settings.size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool_size",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if settings.acquire_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "acquire_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &PathName {
        &self.inner.path
    }

    /// Borrow an idle session, waiting at most `acquire_timeout`.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] when nothing became idle in time,
    /// [`PoolError::Closed`] after [`shutdown`](Self::shutdown).
    pub async fn acquire(&self) -> std::result::Result<PooledConnection, PoolError> {
        let inner = &self.inner;
        let waited = inner.settings.acquire_timeout;

        let permit = match tokio::time::timeout(waited, inner.available.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(PoolError::Closed {
                    path: inner.path.clone(),
                })
            }
            Err(_) => {
                inner.counters.exhausted.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::Exhausted {
                    path: inner.path.clone(),
                    waited,
                });
            }
        };
        permit.forget();

        let Some(pooled) = inner.idle.lock().pop_front() else {
            // Shut down between the permit and the pop.
            return Err(PoolError::Closed {
                path: inner.path.clone(),
            });
        };

        Ok(PooledConnection {
            id: pooled.id,
            session: Some(pooled.session),
            pool: Arc::downgrade(inner),
        })
    }

    /// Return a borrowed session.
    ///
    /// Healthy sessions go back to the idle set. Unhealthy ones, and any the
    /// driver reports closed, are dropped and replaced in the background.
    pub fn release(&self, mut conn: PooledConnection, healthy: bool) {
        let Some(session) = conn.session.take() else {
            return;
        };

        if healthy && !session.is_closed() {
            self.inner.push_idle(PooledSession {
                id: conn.id,
                session,
            });
        } else {
            drop(session);
            self.inner.discard(conn.id);
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let counters = &self.inner.counters;
        PoolStats {
            size: self.inner.settings.size,
            idle: self.inner.idle.lock().len(),
            discarded: counters.discarded.load(Ordering::Relaxed),
            replacements: counters.replacements.load(Ordering::Relaxed),
            replacement_failures: counters.replacement_failures.load(Ordering::Relaxed),
            exhausted: counters.exhausted.load(Ordering::Relaxed),
            pending_replacements: self
                .inner
                .tasks
                .lock()
                .iter()
                .filter(|handle| !handle.is_finished())
                .count(),
        }
    }

    /// Stop replacement tasks and drop idle sessions. Idempotent.
    pub fn shutdown(&self) {
        let dropped = {
            let mut idle = self.inner.idle.lock();
            if self.inner.is_closed() {
                return;
            }
            self.inner.available.close();
            let count = idle.len();
            idle.clear();
            count
        };
        for handle in self.inner.tasks.lock().drain(..) {
            handle.abort();
        }
        debug!(path = %self.inner.path, dropped, "Connection pool shut down");
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
