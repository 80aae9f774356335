//! Lightweight liveness probe: fresh connect, `SELECT 1`, close.
//!
//! Every tick opens a brand-new session, so the probe measures whether new
//! clients can reach the database through the path, independently of the
//! pooled sessions the workload uses. Results feed the path's probe monitor
//! only.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::{Observation, PathName, RunClock};
use crate::error::SessionError;
use crate::port::outbound::database::Connector;
use crate::port::outbound::sink::OutcomeSink;

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub interval: Duration,
    /// Bound on connect plus ping.
    pub timeout: Duration,
    /// Run-clock offset after which probing stops.
    pub horizon: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    pub probes: u64,
    pub failures: u64,
}

pub struct Probe {
    path: PathName,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn OutcomeSink>,
    clock: RunClock,
    settings: ProbeSettings,
}

impl Probe {
    #[must_use]
    pub fn new(
        path: PathName,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn OutcomeSink>,
        clock: RunClock,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            path,
            connector,
            sink,
            clock,
            settings,
        }
    }

    async fn check(&self) -> Result<(), SessionError> {
        let mut session = self.connector.connect().await?;
        session.ping().await
    }

    /// One probe, reported to the sink.
    pub async fn probe_once(&self) -> bool {
        let started_at = self.clock.now();
        let result = tokio::time::timeout(self.settings.timeout, self.check()).await;
        let finished_at = self.clock.now();

        let success = match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(path = self.path.as_str(), error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(path = self.path.as_str(), "Probe timed out");
                false
            }
        };
        self.sink.submit_probe(
            &self.path,
            Observation {
                started_at,
                finished_at,
                success,
            },
        );
        success
    }

    /// Probe every `interval` until the horizon or `stop`.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> ProbeSummary {
        let deadline = self.clock.monotonic_anchor() + self.settings.horizon;
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = ProbeSummary::default();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop.borrow() || Instant::now() >= deadline {
                break;
            }

            summary.probes += 1;
            if !self.probe_once().await {
                summary.failures += 1;
            }
        }

        debug!(
            path = self.path.as_str(),
            probes = summary.probes,
            failures = summary.failures,
            "Probe stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::db::{OutageConnector, ScriptedConnector};
    use crate::testkit::sink::RecordingSink;

    fn probe(connector: Arc<dyn Connector>, sink: Arc<RecordingSink>, clock: RunClock) -> Probe {
        Probe::new(
            PathName::from("proxied"),
            connector,
            sink,
            clock,
            ProbeSettings {
                interval: Duration::from_millis(100),
                timeout: Duration::from_millis(500),
                horizon: Duration::from_secs(3),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn each_probe_opens_a_fresh_connection() {
        let connector = ScriptedConnector::new();
        let sink = Arc::new(RecordingSink::new());
        let p = probe(Arc::new(connector.clone()), Arc::clone(&sink), RunClock::start());

        assert!(p.probe_once().await);
        assert!(p.probe_once().await);
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(connector.ping_count(), 2);
        assert_eq!(sink.probes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connect_is_a_failed_probe() {
        let connector = ScriptedConnector::new().with_latency(Duration::from_secs(10));
        let sink = Arc::new(RecordingSink::new());
        let p = probe(Arc::new(connector), Arc::clone(&sink), RunClock::start());

        assert!(!p.probe_once().await);
        let (_, observation) = &sink.probes()[0];
        assert!(!observation.success);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_interval_until_horizon_and_sees_outage() {
        let clock = RunClock::start();
        let connector =
            OutageConnector::new(clock, Duration::from_secs(1), Duration::from_secs(2));
        let sink = Arc::new(RecordingSink::new());
        let p = probe(Arc::new(connector), Arc::clone(&sink), clock);
        let (_tx, rx) = watch::channel(false);

        let summary = p.run(rx).await;

        // ~30 ticks in 3 s at 100 ms.
        assert!((29..=31).contains(&summary.probes), "{summary:?}");
        assert!((9..=11).contains(&summary.failures), "{summary:?}");
        assert_eq!(sink.probes().len() as u64, summary.probes);
    }
}
