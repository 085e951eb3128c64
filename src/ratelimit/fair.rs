//! Opt-in FIFO admission.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::backend::RateLimiter;
use super::rate::Rate;

/// Wraps a limiter so waiting callers are admitted in arrival order.
///
/// Callers queue on a fair mutex and only the head of the queue waits on the
/// inner limiter. The inner strategy's rate guarantee is unchanged.
pub struct FairLimiter<L> {
    inner: L,
    queue: Mutex<()>,
}

impl<L: RateLimiter> FairLimiter<L> {
    /// Wrap `inner` with first-come first-served admission.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            queue: Mutex::new(()),
        }
    }

    /// The wrapped limiter.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: RateLimiter> RateLimiter for FairLimiter<L> {
    async fn allow(&self) {
        let _turn = self.queue.lock().await;
        self.inner.allow().await;
    }

    fn rate(&self) -> Rate {
        self.inner.rate()
    }
}
