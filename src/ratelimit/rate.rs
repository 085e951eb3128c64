//! Validated admission rate.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::{LimiterError, Result};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Admissions (or tokens) per second.
///
/// A `Rate` is always at least one; zero and negative values are rejected
/// when the rate is built, so a limiter can never run with a nonsensical
/// cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rate(NonZeroU32);

impl Rate {
    /// Create a rate from a raw operations-per-second value.
    pub fn new(per_second: i64) -> Result<Self> {
        u32::try_from(per_second)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Rate)
            .ok_or(LimiterError::InvalidRate(per_second))
    }

    /// Operations per second.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// The cadence at which one token is produced: `1s / rate`.
    ///
    /// Never zero, even for rates above one billion per second.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_nanos((NANOS_PER_SEC / u64::from(self.get())).max(1))
    }
}

impl TryFrom<i64> for Rate {
    type Error = LimiterError;

    fn try_from(value: i64) -> Result<Self> {
        Rate::new(value)
    }
}

impl TryFrom<u32> for Rate {
    type Error = LimiterError;

    fn try_from(value: u32) -> Result<Self> {
        Rate::new(i64::from(value))
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/s", self.0)
    }
}
