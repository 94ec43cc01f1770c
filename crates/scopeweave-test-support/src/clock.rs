//! Fixed clock: a deterministic `Clock` for tests.

use chrono::{DateTime, Utc};
use scopeweave_core::Clock;

/// A clock that always returns the same point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
