use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

/// Source of wall-clock readings. Swappable so tests can freeze time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Wall clock pinned to a single instant. Every reading is identical, which
/// models a clock whose resolution is coarser than the caller's pace.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Smallest step the logical clock advances by on a tie.
pub const TICK: Duration = Duration::nanoseconds(1);

/// Monotonic timestamp source layered over a wall clock.
///
/// Each issued timestamp is strictly greater than the previous one: when the
/// wall clock has not moved past the last issued value, the last value is
/// bumped by [`TICK`] instead.
pub struct LogicalClock {
    wall: Arc<dyn Clock>,
    last: Mutex<Option<OffsetDateTime>>,
}

impl LogicalClock {
    pub fn new(wall: Arc<dyn Clock>) -> Self {
        Self {
            wall,
            last: Mutex::new(None),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> OffsetDateTime {
        let reading = self.wall.now();
        // a poisoned lock still holds a valid timestamp
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let issued = match *last {
            Some(prev) if reading <= prev => prev + TICK,
            _ => reading,
        };
        *last = Some(issued);
        issued
    }
}

impl std::fmt::Debug for LogicalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalClock")
            .field("last", &self.last.lock().ok().and_then(|l| *l))
            .finish()
    }
}
