//! Simulated databases implementing [`Connector`] and [`Session`].
//!
//! - [`ScriptedConnector`]: pre-loaded connect and operation results.
//!   Best for: pool replacement, executor classification, retry behaviour.
//!
//! - [`OutageConnector`]: healthy except during one window of the run
//!   clock, when connects are refused and every existing session is severed.
//!   Best for: end-to-end downtime scenarios under paused time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::RunClock;
use crate::error::SessionError;
use crate::port::outbound::database::{Connector, Session, Statement};

// ---------------------------------------------------------------------------
// ScriptedConnector
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    connect_results: Mutex<VecDeque<Result<(), SessionError>>>,
    op_results: Mutex<VecDeque<Result<u64, SessionError>>>,
    statements: Mutex<Vec<&'static str>>,
    latency: Mutex<Duration>,
    connect_latency: Mutex<Duration>,
    connects: AtomicU32,
    executions: AtomicU32,
    transactions: AtomicU32,
    pings: AtomicU32,
}

/// Connector whose sessions share one script.
///
/// Each `connect()` pops the next connect result and each `execute`,
/// `transaction` or `ping` pops the next operation result; both default to
/// success (`Ok(1)`) when their queue is empty. A session that returns
/// `ConnectionLost` reports itself closed from then on.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_results(self, results: Vec<Result<(), SessionError>>) -> Self {
        self.script.connect_results.lock().extend(results);
        self
    }

    pub fn with_op_results(self, results: Vec<Result<u64, SessionError>>) -> Self {
        self.script.op_results.lock().extend(results);
        self
    }

    /// Simulated round-trip time for every session call.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.script.latency.lock() = latency;
        self
    }

    /// Simulated handshake time for every `connect()`.
    pub fn with_connect_latency(self, latency: Duration) -> Self {
        *self.script.connect_latency.lock() = latency;
        self
    }

    pub fn push_connect_result(&self, result: Result<(), SessionError>) {
        self.script.connect_results.lock().push_back(result);
    }

    pub fn push_op_result(&self, result: Result<u64, SessionError>) {
        self.script.op_results.lock().push_back(result);
    }

    pub fn connect_count(&self) -> u32 {
        self.script.connects.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> u32 {
        self.script.executions.load(Ordering::SeqCst)
    }

    pub fn transaction_count(&self) -> u32 {
        self.script.transactions.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> u32 {
        self.script.pings.load(Ordering::SeqCst)
    }

    /// SQL of every statement run so far, transactions expanded.
    pub fn statements(&self) -> Vec<&'static str> {
        self.script.statements.lock().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn Session>, SessionError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        let latency = *self.script.connect_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let result = self
            .script
            .connect_results
            .lock()
            .pop_front()
            .unwrap_or(Ok(()));
        result.map(|()| {
            Box::new(ScriptedSession {
                script: Arc::clone(&self.script),
                closed: false,
            }) as Box<dyn Session>
        })
    }

    fn target(&self) -> String {
        "scripted".to_string()
    }
}

pub struct ScriptedSession {
    script: Arc<Script>,
    closed: bool,
}

impl ScriptedSession {
    async fn next_result(&mut self) -> Result<u64, SessionError> {
        let latency = *self.script.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.closed {
            return Err(SessionError::ConnectionLost("session closed".into()));
        }
        let result = self.script.op_results.lock().pop_front().unwrap_or(Ok(1));
        if matches!(result, Err(SessionError::ConnectionLost(_))) {
            self.closed = true;
        }
        result
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        self.script.executions.fetch_add(1, Ordering::SeqCst);
        self.script.statements.lock().push(statement.sql);
        self.next_result().await
    }

    async fn transaction(&mut self, statements: &[Statement]) -> Result<u64, SessionError> {
        self.script.transactions.fetch_add(1, Ordering::SeqCst);
        self.script
            .statements
            .lock()
            .extend(statements.iter().map(|s| s.sql));
        self.next_result().await
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.script.pings.fetch_add(1, Ordering::SeqCst);
        self.next_result().await.map(|_| ())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ---------------------------------------------------------------------------
// OutageConnector
// ---------------------------------------------------------------------------

/// A database that fails over during `[from, to)` of the run clock.
///
/// Inside the window connects are refused and every call fails with
/// `ConnectionLost`. Sessions opened before `from` are severed for good, as
/// a real failover drops every client connection; sessions opened after
/// `to` work normally.
#[derive(Clone)]
pub struct OutageConnector {
    clock: RunClock,
    from: Duration,
    to: Duration,
    latency: Duration,
    connects: Arc<AtomicU32>,
    refused: Arc<AtomicU32>,
}

impl OutageConnector {
    pub fn new(clock: RunClock, from: Duration, to: Duration) -> Self {
        Self {
            clock,
            from,
            to,
            latency: Duration::ZERO,
            connects: Arc::new(AtomicU32::new(0)),
            refused: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Whether the simulated database is currently unreachable.
    pub fn in_outage(&self) -> bool {
        let now = self.clock.elapsed();
        now >= self.from && now < self.to
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn refused_count(&self) -> u32 {
        self.refused.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for OutageConnector {
    async fn connect(&self) -> Result<Box<dyn Session>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.in_outage() {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return Err(SessionError::ConnectionLost("connection refused".into()));
        }
        Ok(Box::new(OutageSession {
            db: self.clone(),
            opened_at: self.clock.elapsed(),
            closed: false,
        }))
    }

    fn target(&self) -> String {
        format!("simulated failover {:?}..{:?}", self.from, self.to)
    }
}

pub struct OutageSession {
    db: OutageConnector,
    opened_at: Duration,
    closed: bool,
}

impl OutageSession {
    async fn round_trip(&mut self) -> Result<u64, SessionError> {
        if !self.db.latency.is_zero() {
            tokio::time::sleep(self.db.latency).await;
        }
        let severed = self.opened_at < self.db.from && self.db.clock.elapsed() >= self.db.from;
        if self.closed || severed || self.db.in_outage() {
            self.closed = true;
            return Err(SessionError::ConnectionLost(
                "server closed the connection unexpectedly".into(),
            ));
        }
        Ok(1)
    }
}

#[async_trait]
impl Session for OutageSession {
    async fn execute(&mut self, _statement: &Statement) -> Result<u64, SessionError> {
        self.round_trip().await
    }

    async fn transaction(&mut self, statements: &[Statement]) -> Result<u64, SessionError> {
        self.round_trip().await?;
        Ok(statements.len() as u64)
    }

    async fn ping(&mut self) -> Result<(), SessionError> {
        self.round_trip().await.map(|_| ())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
