//! Wall-clock source for window alignment.
//!
//! The fixed-window limiter aligns windows to whole epoch seconds, so it reads
//! wall-clock time rather than a monotonic [`std::time::Instant`]. Tests swap in
//! [`MockClock`] to drive window rollovers deterministically.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockClock;

#[cfg(any(test, feature = "test-helpers"))]
mod mock {
    use super::Clock;
    use chrono::{DateTime, Duration, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Controllable clock for tests.
    ///
    /// Clones share the same underlying time, so advancing one clone is visible
    /// to a limiter holding another.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        current: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MockClock {
        /// Create a mock clock frozen at `start`.
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                current: Arc::new(Mutex::new(start)),
            }
        }

        /// Create a mock clock at `secs` epoch seconds plus `millis`.
        pub fn at(secs: i64, millis: u32) -> Self {
            let start = DateTime::from_timestamp(secs, millis * 1_000_000)
                .unwrap_or_default();
            Self::new(start)
        }

        /// Advance the clock.
        pub fn advance(&self, by: std::time::Duration) {
            let by = Duration::from_std(by).unwrap_or(Duration::zero());
            *self.current.lock() += by;
        }

        /// Set the clock to a specific time.
        pub fn set(&self, at: DateTime<Utc>) {
            *self.current.lock() = at;
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            *self.current.lock()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_mock_clock_shared_between_clones() {
        let clock = MockClock::at(1_000, 250);
        let other = clock.clone();

        assert_eq!(clock.now().timestamp(), 1_000);
        assert_eq!(clock.now().timestamp_subsec_millis(), 250);

        other.advance(Duration::from_millis(800));
        assert_eq!(clock.now().timestamp(), 1_001);
        assert_eq!(clock.now().timestamp_subsec_millis(), 50);

        clock.set(DateTime::from_timestamp(42, 0).unwrap());
        assert_eq!(other.now().timestamp(), 42);
    }
}
