//! Monotonic run clock.
//!
//! Timestamps on outcomes and intervals come from a single anchor captured at
//! run start: wall-clock `Utc::now()` once, then a monotonic
//! [`tokio::time::Instant`] for everything after. Wall-clock adjustments
//! during a run therefore cannot stretch or shrink a measured interval, and
//! tests running on tokio's paused clock get exact, reproducible timestamps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    wall_anchor: DateTime<Utc>,
    mono_anchor: Instant,
}

impl RunClock {
    /// Anchor a new clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchor at a chosen wall-clock time; the monotonic origin is "now".
    #[must_use]
    pub fn anchored_at(wall_anchor: DateTime<Utc>) -> Self {
        Self {
            wall_anchor,
            mono_anchor: Instant::now(),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.at(self.elapsed())
    }

    /// Time since the anchor.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.mono_anchor.elapsed()
    }

    /// Wall-clock timestamp `offset` after the anchor.
    #[must_use]
    pub fn at(&self, offset: Duration) -> DateTime<Utc> {
        let Ok(offset) = chrono::Duration::from_std(offset) else {
            return DateTime::<Utc>::MAX_UTC;
        };
        self.wall_anchor
            .checked_add_signed(offset)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Offset of `at` from the anchor; zero for timestamps before it.
    #[must_use]
    pub fn offset_of(&self, at: DateTime<Utc>) -> Duration {
        (at - self.wall_anchor).to_std().unwrap_or_default()
    }

    #[must_use]
    pub const fn anchor(&self) -> DateTime<Utc> {
        self.wall_anchor
    }

    #[must_use]
    pub const fn monotonic_anchor(&self) -> Instant {
        self.mono_anchor
    }
}
