//! Rate limiting strategies and the capability they share.

mod backend;
mod builder;
mod clock;
mod fair;
mod fixed_window;
mod rate;
mod token_bucket;

pub use backend::{allow_until_cancelled, RateLimiter};
pub use builder::build_limiter;
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::MockClock;
pub use clock::{Clock, SystemClock};
pub use fair::FairLimiter;
pub use fixed_window::FixedWindowLimiter;
pub use rate::Rate;
pub use token_bucket::TokenBucketLimiter;
