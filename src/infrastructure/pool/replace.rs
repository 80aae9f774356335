use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::infrastructure::config::pool::ReconnectionConfig;

use super::state::PooledSession;
use super::PoolInner;

/// Exponential backoff with up to 20% jitter.
pub(super) struct Backoff {
    config: ReconnectionConfig,
    current_delay_ms: u64,
}

impl Backoff {
    pub(super) fn new(config: ReconnectionConfig) -> Self {
        let current_delay_ms = config.initial_delay_ms;
        Self {
            config,
            current_delay_ms,
        }
    }

    /// Returns the current delay and advances to the next one.
    pub(super) fn next_delay(&mut self) -> Duration {
        let base = self.current_delay_ms;
        let jitter_range = base / 5;
        let jitter = if jitter_range == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_range)
        };

        let next = (self.current_delay_ms as f64 * self.config.backoff_multiplier) as u64;
        self.current_delay_ms = next.min(self.config.max_delay_ms).max(1);

        Duration::from_millis(base + jitter)
    }
}

/// Schedule a background task that opens one connection to replace a
/// discarded one.
pub(super) fn spawn_replacement(inner: &Arc<PoolInner>) {
    if inner.is_closed() {
        return;
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(path = %inner.path, "No runtime available, replacement skipped");
        return;
    };

    let task = runtime.spawn(replace_connection(Arc::clone(inner)));
    let mut tasks = inner.tasks.lock();
    tasks.retain(|handle| !handle.is_finished());
    tasks.push(task);
}

/// Retry until a connection is established or the pool shuts down.
async fn replace_connection(inner: Arc<PoolInner>) {
    let mut backoff = Backoff::new(inner.settings.reconnection.clone());
    let mut attempts: u32 = 0;

    loop {
        if inner.is_closed() {
            return;
        }
        attempts += 1;

        match inner.connector.connect().await {
            Ok(session) => {
                let id = inner.next_connection_id();
                inner.counters.replacements.fetch_add(1, Ordering::Relaxed);
                info!(
                    path = %inner.path,
                    connection_id = id,
                    attempts,
                    "Replacement connection established"
                );
                inner.push_idle(PooledSession { id, session });
                return;
            }
            Err(e) => {
                inner
                    .counters
                    .replacement_failures
                    .fetch_add(1, Ordering::Relaxed);
                let delay = backoff.next_delay();
                debug!(
                    path = %inner.path,
                    attempts,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Replacement connect failed"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
