//! Wall-clock abstraction.
//!
//! Breaker cooldowns and TTL bookkeeping read time through [`Clock`] so tests can
//! move time forward without sleeping.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the current system time, truncated to whole milliseconds
    /// like every persisted timestamp.
    pub fn starting_now() -> Arc<Self> {
        Arc::new(Self::new(Utc::now().trunc_subsecs(3)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(chrono::Duration::seconds(secs));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Shared handle to the system clock.
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::starting_now();
        let start = clock.now();
        clock.advance_secs(61);
        assert_eq!((clock.now() - start).num_seconds(), 61);
    }

    #[test]
    fn test_manual_clock_starts_on_a_millisecond() {
        let start = ManualClock::starting_now().now();
        assert_eq!(start.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(
            crate::database::time::ms_to_datetime(crate::database::time::datetime_to_ms(start)),
            start
        );
    }
}
