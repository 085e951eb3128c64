//! Token-bucket limiter with an owned refill task.
//!
//! The pool is a [`Semaphore`] whose permits are the tokens. A background task
//! adds one permit per refill interval unless the pool is already full; it is
//! the only producer, so checking the size before adding cannot overshoot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::backend::RateLimiter;
use super::rate::Rate;
use crate::error::{LimiterError, Result};

/// Admits callers as tokens become available, with bursts up to `capacity`.
///
/// The refill task is started by [`TokenBucketLimiter::new`] and lives exactly
/// as long as the limiter: [`shutdown`](TokenBucketLimiter::shutdown) stops it
/// gracefully, and dropping the limiter aborts it.
pub struct TokenBucketLimiter {
    rate: Rate,
    /// Maximum tokens held at once; equal to `rate`.
    capacity: usize,
    refill_interval: Duration,
    tokens: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    refill_task: Option<JoinHandle<()>>,
}

impl TokenBucketLimiter {
    /// Create an empty bucket and start its refill task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(rate: Rate) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LimiterError::NoRuntime)?;

        let capacity = rate.get() as usize;
        let refill_interval = rate.refill_interval();
        let tokens = Arc::new(Semaphore::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let refill_task = runtime.spawn(refill_loop(
            Arc::clone(&tokens),
            capacity,
            refill_interval,
            shutdown_rx,
        ));

        debug!(
            rate = %rate,
            capacity = capacity,
            refill_interval = ?refill_interval,
            "Created token bucket limiter"
        );

        Ok(Self {
            rate,
            capacity,
            refill_interval,
            tokens,
            shutdown_tx,
            refill_task: Some(refill_task),
        })
    }

    /// Take a token if one is present, without waiting.
    pub fn try_allow(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Tokens currently in the pool.
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Maximum tokens the pool may hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The cadence at which one token is added.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Stop the refill task and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.refill_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Refill task ended abnormally");
            }
        }
        debug!(rate = %self.rate, "Token bucket limiter shut down");
    }
}

impl Drop for TokenBucketLimiter {
    fn drop(&mut self) {
        if let Some(task) = self.refill_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn allow(&self) {
        // Nothing closes the pool. If it ever were closed no token could be
        // produced again, so the caller stays blocked rather than admitted.
        match self.tokens.acquire().await {
            Ok(permit) => {
                permit.forget();
                trace!(remaining = self.tokens.available_permits(), "Token consumed");
            }
            Err(e) => {
                warn!(error = %e, "Token pool closed, no further admissions");
                std::future::pending::<()>().await;
            }
        }
    }

    fn rate(&self) -> Rate {
        self.rate
    }
}

/// Add one token per tick until told to stop.
///
/// Ticks that find the pool full are dropped, and missed ticks are skipped
/// rather than replayed, so idle time never buys more than `capacity` tokens.
async fn refill_loop(
    tokens: Arc<Semaphore>,
    capacity: usize,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tokens.available_permits() < capacity {
                    tokens.add_permits(1);
                    trace!(available = tokens.available_permits(), "Token added");
                } else {
                    trace!("Pool full, refill tick dropped");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Refill task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready};

    fn rate(n: i64) -> Rate {
        Rate::new(n).unwrap()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(
            TokenBucketLimiter::new(rate(5)),
            Err(LimiterError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_empty_and_refills_on_cadence() {
        let limiter = TokenBucketLimiter::new(rate(5)).unwrap();
        assert_eq!(limiter.capacity(), 5);
        assert_eq!(limiter.refill_interval(), Duration::from_millis(200));
        assert_eq!(limiter.available(), 0);
        assert!(!limiter.try_allow());

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_pool_saturates_at_capacity() {
        let limiter = TokenBucketLimiter::new(rate(4)).unwrap();

        // Far more than `capacity` refill intervals
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(limiter.available(), 4);

        let mut immediate = 0;
        while limiter.try_allow() {
            immediate += 1;
        }
        assert_eq!(immediate, 4);

        let mut next = tokio_test::task::spawn(limiter.allow());
        assert_pending!(next.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pool_ticks_are_not_banked() {
        let limiter = TokenBucketLimiter::new(rate(5)).unwrap();
        // Off the tick grid so no refill coincides with the drain
        tokio::time::sleep(Duration::from_millis(3_100)).await;

        // Drain back to back: exactly capacity immediate admissions
        let start = Instant::now();
        for _ in 0..5 {
            limiter.allow().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // The very next one waits for a fresh tick
        let mut next = tokio_test::task::spawn(limiter.allow());
        assert_pending!(next.poll());
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert!(next.is_woken());
        assert_ready!(next.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_paced_admissions() {
        let limiter = TokenBucketLimiter::new(rate(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        let start = Instant::now();
        let mut at = Vec::with_capacity(10);
        for _ in 0..10 {
            limiter.allow().await;
            at.push(start.elapsed());
        }

        // First `capacity` calls are immediate
        assert!(at[..5].iter().all(|d| *d == Duration::ZERO), "{:?}", at);

        // The rest wait for the next tick, then follow ~200ms apart
        assert!(at[5] > Duration::ZERO && at[5] <= Duration::from_millis(200), "{:?}", at);
        for pair in at[5..].windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(150) && gap <= Duration::from_millis(250),
                "gap {:?} in {:?}",
                gap,
                at
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_callers_all_admitted() {
        let limiter = Arc::new(TokenBucketLimiter::new(rate(3)).unwrap());
        let admitted = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..9)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                tokio::spawn(async move {
                    limiter.allow().await;
                    admitted.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_caller_leaves_token_in_pool() {
        let limiter = TokenBucketLimiter::new(rate(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Gives up at 150ms, before the first tick at 200ms
        let result = limiter.allow_timeout(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(LimiterError::Timeout(_))));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_allow());
        assert_eq!(limiter.available(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_callers_all_admitted() {
        let limiter = Arc::new(TokenBucketLimiter::new(rate(10)).unwrap());
        let admitted = Arc::new(AtomicUsize::new(0));
        let start = std::time::Instant::now();

        let tasks: Vec<_> = (0..30)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                tokio::spawn(async move {
                    limiter.allow().await;
                    assert!(limiter.available() <= limiter.capacity());
                    admitted.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 30);

        // 30 tokens at 10/s from an empty pool need about three seconds
        assert!(start.elapsed() >= Duration::from_millis(2_900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_refill_task() {
        let limiter = TokenBucketLimiter::new(rate(10)).unwrap();
        let tokens = Arc::clone(&limiter.tokens);

        limiter.shutdown().await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(tokens.available_permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_refill_task() {
        let limiter = TokenBucketLimiter::new(rate(10)).unwrap();
        let tokens = Arc::clone(&limiter.tokens);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(tokens.available_permits(), 2);

        drop(limiter);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(tokens.available_permits(), 2);
    }
}
