//! Time source shared by the engine, the reconciler and the durable store
//!
//! Everything is Unix milliseconds so that in-memory `last_activity` and the
//! durable `created_at` can be compared directly.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDate, TimeZone};

/// Source of "now"
pub trait Clock: Send + Sync {
    /// Current time in Unix milliseconds
    fn now_ms(&self) -> i64;

    /// Local calendar date of `now_ms`
    fn today(&self) -> NaiveDate {
        local_date(self.now_ms())
    }

    /// Unix milliseconds of the most recent local midnight
    fn local_midnight_ms(&self) -> i64 {
        local_midnight(self.now_ms())
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        progressstore::now_ms()
    }
}

/// Settable clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn local_date(ms: i64) -> NaiveDate {
    match Local.timestamp_millis_opt(ms).earliest() {
        Some(dt) => dt.date_naive(),
        None => chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| dt.date_naive())
            .unwrap_or_default(),
    }
}

fn local_midnight(ms: i64) -> i64 {
    local_date(ms)
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 3_000);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_local_midnight_is_not_after_now() {
        let clock = ManualClock::new(1_760_000_000_000);
        let midnight = clock.local_midnight_ms();
        assert!(midnight <= clock.now_ms());
        assert!(clock.now_ms() - midnight < 25 * 3600 * 1000);
        assert_eq!(local_date(midnight), clock.today());
    }
}
