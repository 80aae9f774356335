//! Runs one operation on a borrowed session and classifies the result.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::application::catalog::{OperationCatalog, OperationPlan};
use crate::domain::{ErrorClass, OperationKind, OperationOutcome, RunClock};
use crate::error::SessionError;
use crate::port::outbound::database::Session;

/// Turns a kind into an [`OperationOutcome`].
///
/// Never returns an error: every failure, a client-side timeout included,
/// becomes a failed outcome. Callers decide what to do with the connection
/// from [`OperationOutcome::keeps_connection`].
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    catalog: Arc<OperationCatalog>,
    statement_timeout: Duration,
    clock: RunClock,
}

impl OperationExecutor {
    #[must_use]
    pub fn new(catalog: Arc<OperationCatalog>, statement_timeout: Duration, clock: RunClock) -> Self {
        Self {
            catalog,
            statement_timeout,
            clock,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn clock(&self) -> &RunClock {
        &self.clock
    }

    /// Plan and run one operation of `kind`.
    pub async fn execute<R: Rng + ?Sized>(
        &self,
        session: &mut dyn Session,
        kind: OperationKind,
        rng: &mut R,
    ) -> OperationOutcome {
        let plan = self.catalog.plan(kind, rng);
        self.run_plan(session, &plan).await
    }

    /// Run a prepared plan. Timing covers first statement sent to final
    /// acknowledgement, commit or rollback included.
    pub async fn run_plan(&self, session: &mut dyn Session, plan: &OperationPlan) -> OperationOutcome {
        let started_at = self.clock.now();
        let result = tokio::time::timeout(self.statement_timeout, Self::send(session, plan)).await;
        let finished_at = self.clock.now();

        match result {
            Ok(Ok(rows)) => OperationOutcome::succeeded(plan.kind, started_at, finished_at, rows),
            Ok(Err(e)) => {
                let class = e.class();
                debug!(
                    kind = %plan.kind,
                    variant = plan.variant,
                    class = %class,
                    error = %e,
                    "Operation failed"
                );
                OperationOutcome::failed(plan.kind, started_at, finished_at, class)
            }
            Err(_) => {
                debug!(
                    kind = %plan.kind,
                    variant = plan.variant,
                    timeout_ms = self.statement_timeout.as_millis() as u64,
                    "Operation timed out"
                );
                OperationOutcome::failed(plan.kind, started_at, finished_at, ErrorClass::Timeout)
            }
        }
    }

    async fn send(session: &mut dyn Session, plan: &OperationPlan) -> Result<u64, SessionError> {
        if plan.atomic {
            return session.transaction(&plan.statements).await;
        }
        let mut rows = 0;
        for statement in &plan.statements {
            rows += session.execute(statement).await?;
        }
        Ok(rows)
    }
}
