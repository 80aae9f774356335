//! Bridge from an external load generator's output into the run snapshot.
//!
//! The generator runs as its own process; this side only reads what it
//! prints. Lines are parsed by an inbound adapter into [`LoadEvent`]s, which
//! are stamped with the run clock and folded into the path's aggregates.
//!
//! A progress sample carrying the generator's elapsed time is stamped at that
//! offset of the run clock, so a log read after the fact lands where it was
//! produced. Lines without one take the last offset seen in the stream, or
//! the read time before any.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::debug;

use crate::application::aggregator::LoadEvent;
use crate::application::recorder::RunRecorder;
use crate::domain::PathName;

/// Turns one output line into an event, if it carries one.
pub type LineParser = fn(&str) -> Option<LoadEvent>;

/// Counts from one pumped stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpSummary {
    pub lines: u64,
    pub events: u64,
    pub errors: u64,
}

/// Stamps and forwards load-generator reports.
#[derive(Clone)]
pub struct LoadBridge {
    recorder: Arc<RunRecorder>,
}

impl LoadBridge {
    #[must_use]
    pub fn new(recorder: Arc<RunRecorder>) -> Self {
        Self { recorder }
    }

    /// Record `event` at `offset` into the run, or now without one.
    pub fn report(&self, path: &PathName, offset: Option<Duration>, event: &LoadEvent) {
        let clock = self.recorder.clock();
        let at = offset.map_or_else(|| clock.now(), |offset| clock.at(offset));
        self.recorder.record_load(path, at, event);
    }

    /// Read `reader` line by line until EOF or `stop`, reporting every
    /// parsed event against `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `reader` fails.
    pub async fn pump<R>(
        &self,
        path: &PathName,
        reader: R,
        parse: LineParser,
        mut stop: watch::Receiver<bool>,
    ) -> std::io::Result<PumpSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut summary = PumpSummary::default();
        let mut offset = None;

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            };
            let Some(line) = line else {
                break;
            };

            summary.lines += 1;
            if let Some(event) = parse(&line) {
                summary.events += 1;
                if matches!(event, LoadEvent::Error) {
                    summary.errors += 1;
                    debug!(path = path.as_str(), line = line.as_str(), "Load generator error");
                }
                if let LoadEvent::Progress {
                    offset: Some(at), ..
                } = event
                {
                    offset = Some(at);
                }
                self.report(path, offset, &event);
            }
        }

        debug!(
            path = path.as_str(),
            lines = summary.lines,
            events = summary.events,
            "Load generator stream ended"
        );
        Ok(summary)
    }
}
