//! Construct a limiter from configuration.

use tracing::info;

use super::backend::RateLimiter;
use super::fair::FairLimiter;
use super::fixed_window::FixedWindowLimiter;
use super::token_bucket::TokenBucketLimiter;
use crate::config::{LimiterConfig, Strategy};
use crate::error::Result;

/// Build the limiter described by `config`.
///
/// Fails before anything is started if the rate is not positive. The token
/// bucket must be built inside a tokio runtime.
pub fn build_limiter(config: &LimiterConfig) -> Result<Box<dyn RateLimiter>> {
    let rate = config.validate()?;

    let limiter: Box<dyn RateLimiter> = match config.strategy {
        Strategy::FixedWindow => Box::new(FixedWindowLimiter::new(rate)),
        Strategy::TokenBucket => Box::new(TokenBucketLimiter::new(rate)?),
    };

    info!(
        strategy = %config.strategy,
        rate = %rate,
        fair = config.fair,
        "Rate limiter initialized"
    );

    if config.fair {
        Ok(Box::new(FairLimiter::new(limiter)))
    } else {
        Ok(limiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LimiterError;

    #[tokio::test]
    async fn test_build_each_strategy() {
        for strategy in [Strategy::FixedWindow, Strategy::TokenBucket] {
            for fair in [false, true] {
                let config = LimiterConfig {
                    strategy,
                    rate: 8,
                    fair,
                };
                let limiter = build_limiter(&config).unwrap();
                assert_eq!(limiter.rate().get(), 8);
            }
        }
    }

    #[tokio::test]
    async fn test_build_rejects_bad_rate() {
        for rate in [0, -1] {
            for strategy in [Strategy::FixedWindow, Strategy::TokenBucket] {
                let config = LimiterConfig {
                    strategy,
                    rate,
                    fair: false,
                };
                assert!(matches!(
                    build_limiter(&config),
                    Err(LimiterError::InvalidRate(r)) if r == rate
                ));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_built_fixed_window_admits() {
        let config = LimiterConfig {
            strategy: Strategy::FixedWindow,
            rate: 3,
            fair: true,
        };
        let limiter = build_limiter(&config).unwrap();
        assert!(limiter
            .allow_timeout(std::time::Duration::from_millis(10))
            .await
            .is_ok());
    }
}
