//! Clock port — local wall-clock time for window matching.

use thermo_domain::time::{LocalTime, now_local};
use tokio::time::Instant;

/// Source of the local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> LocalTime;
}

impl<T: Clock> Clock for std::sync::Arc<T> {
    fn now(&self) -> LocalTime {
        (**self).now()
    }
}

/// The host's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> LocalTime {
        now_local()
    }
}

/// Local time that starts at a fixed instant and advances with the tokio
/// clock, so paused-time tests and simulations see consistent wall time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: LocalTime,
    started: Instant,
}

impl TokioClock {
    #[must_use]
    pub fn starting_at(origin: LocalTime) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> LocalTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or(chrono::Duration::MAX);
        self.origin
            .checked_add_signed(elapsed)
            .unwrap_or(self.origin)
    }
}
