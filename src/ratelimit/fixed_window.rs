//! Fixed-window counter limiter.
//!
//! Windows are whole wall-clock seconds. Rollover is detected lazily by the
//! next caller rather than by a timer.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::backend::RateLimiter;
use super::clock::{Clock, SystemClock};
use super::rate::Rate;

/// Upper bound on a single wait between retries of a full window.
const MAX_BACKOFF: Duration = Duration::from_millis(50);
/// Lower bound, so a clock sitting exactly on a boundary does not spin.
const MIN_BACKOFF: Duration = Duration::from_millis(1);
const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Counter state for the current window.
#[derive(Debug, Default)]
struct WindowState {
    /// Epoch second identifying the current window
    window_start: i64,
    /// Admissions granted within `window_start`
    count: u32,
}

/// Admits at most `rate` callers per wall-clock second.
///
/// A caller arriving at a full window sleeps until the next second boundary
/// (never longer than 50 ms at a time) and then retries. The lock
/// guarding the counter is held only for the read-modify-write.
pub struct FixedWindowLimiter<C: Clock = SystemClock> {
    rate: Rate,
    state: Mutex<WindowState>,
    clock: C,
}

impl FixedWindowLimiter {
    /// Create a limiter aligned to the system clock.
    pub fn new(rate: Rate) -> Self {
        Self::with_clock(rate, SystemClock::new())
    }
}

impl<C: Clock> FixedWindowLimiter<C> {
    /// Create a limiter reading wall-clock time from `clock`.
    pub fn with_clock(rate: Rate, clock: C) -> Self {
        debug!(rate = %rate, "Creating fixed window limiter");
        Self {
            rate,
            state: Mutex::new(WindowState::default()),
            clock,
        }
    }

    /// Take an admission if the current window has room, without waiting.
    pub fn try_allow(&self) -> bool {
        self.try_acquire().is_ok()
    }

    /// Admissions granted so far in the current window.
    pub fn current_count(&self) -> u32 {
        let state = self.state.lock();
        if state.window_start == self.clock.now().timestamp() {
            state.count
        } else {
            0
        }
    }

    /// One attempt under the lock.
    ///
    /// Returns the epoch second admitted into, or on a full window how long
    /// to wait before trying again.
    fn try_acquire(&self) -> Result<i64, Duration> {
        let mut state = self.state.lock();

        // Read the clock under the lock so a caller holding an older reading
        // cannot race another caller's rollover and reopen an exhausted second.
        let now = self.clock.now();
        let second = now.timestamp();

        if state.window_start != second {
            trace!(
                previous = state.window_start,
                current = second,
                admitted = state.count,
                "Window rolled over"
            );
            state.window_start = second;
            state.count = 0;
        }

        if state.count < self.rate.get() {
            state.count += 1;
            trace!(window = second, count = state.count, "Admission granted");
            return Ok(second);
        }

        let until_next = NANOS_PER_SEC.saturating_sub(now.timestamp_subsec_nanos());
        Err(Duration::from_nanos(u64::from(until_next)).clamp(MIN_BACKOFF, MAX_BACKOFF))
    }

    /// Wait for a slot, returning the epoch second it was granted in.
    async fn admit(&self) -> i64 {
        loop {
            match self.try_acquire() {
                Ok(second) => return second,
                Err(backoff) => {
                    trace!(backoff = ?backoff, "Window exhausted, waiting");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl<C: Clock> RateLimiter for FixedWindowLimiter<C> {
    async fn allow(&self) {
        self.admit().await;
    }

    fn rate(&self) -> Rate {
        self.rate
    }
}
