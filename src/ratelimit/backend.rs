//! The admission capability shared by every limiter strategy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::rate::Rate;
use crate::error::{LimiterError, Result};

/// Trait for rate limiter implementations.
///
/// Callers are written against this trait rather than a concrete strategy,
/// so a deployment can front a resource with either the fixed-window or the
/// token-bucket limiter.
///
/// Dropping the future returned by [`allow`](RateLimiter::allow) before it
/// completes consumes no admission, which is what makes the timeout and
/// cancellation helpers safe to layer on top.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one admission is granted.
    ///
    /// Never fails and never rejects: exhaustion is expressed only as delay.
    /// No ordering is promised among concurrently waiting callers.
    async fn allow(&self);

    /// The configured ceiling.
    fn rate(&self) -> Rate;

    /// Wait for admission for at most `timeout`.
    ///
    /// Returns [`LimiterError::Timeout`] if the deadline passes first, letting
    /// callers that prefer rejection over delay build it on the primitive.
    async fn allow_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.allow())
            .await
            .map_err(|_| LimiterError::Timeout(timeout))
    }
}

/// Wait for admission unless `cancel` resolves first.
///
/// Returns [`LimiterError::Cancelled`] when the caller's signal wins.
pub async fn allow_until_cancelled<L, F>(limiter: &L, cancel: F) -> Result<()>
where
    L: RateLimiter + ?Sized,
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = limiter.allow() => Ok(()),
        _ = cancel => Err(LimiterError::Cancelled),
    }
}

#[async_trait]
impl<L: RateLimiter + ?Sized> RateLimiter for Box<L> {
    async fn allow(&self) {
        (**self).allow().await
    }

    fn rate(&self) -> Rate {
        (**self).rate()
    }
}

#[async_trait]
impl<L: RateLimiter + ?Sized> RateLimiter for Arc<L> {
    async fn allow(&self) {
        (**self).allow().await
    }

    fn rate(&self) -> Rate {
        (**self).rate()
    }
}
