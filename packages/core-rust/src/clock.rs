//! Abstraction over wall-clock time for dependency injection.
//!
//! Mirrors the reference server's HLC clock split: a small trait gives
//! every timestamp-sensitive component (TTL expiry, the timer list) a
//! seam for deterministic tests, while production code uses the real
//! system clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current wall-clock time, expressed as milliseconds since
/// the Unix epoch.
///
/// Implementations must be monotonic enough for TTL comparisons; they are
/// not required to be strictly monotonic across calls (the real clock can
/// step backwards on NTP correction, which only affects how early a key
/// expires, never data-model correctness).
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before Unix epoch")
            .as_millis() as u64
    }
}

/// A clock that can be advanced manually, for deterministic tests of TTL
/// expiry and the timer list without real sleeps.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given time.
    #[must_use]
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_millis),
        }
    }

    /// Advances the clock by `delta` milliseconds and returns the new time.
    pub fn advance(&self, delta_millis: u64) -> u64 {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis
    }
}

impl ClockSource for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_roughly_now() {
        let clock = SystemClock;
        let now = clock.now_millis();
        assert!(now > 1_700_000_000_000);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now_millis(), 1000);
        assert_eq!(clock.advance(50), 1050);
        assert_eq!(clock.now_millis(), 1050);
    }
}
