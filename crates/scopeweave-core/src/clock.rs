//! Clock abstraction for timestamps stamped on recorded entries.

use chrono::{DateTime, Utc};

/// Source of the timestamps stamped on recorded entries.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
