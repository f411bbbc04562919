//! The engine reads wall-clock time only through this capability, never
//! through a process-wide `Utc::now()` call, so tests can supply a fixed
//! clock (REDESIGN FLAGS, `spec.md` §9: "Global clock").

use chrono::{DateTime, Utc};

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for tests. Does not advance on its own; tests that need to
/// simulate the passage of time construct a new `StaticClock`.
#[derive(Debug, Clone, Copy)]
pub struct StaticClock(pub DateTime<Utc>);

impl TimeSource for StaticClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
