//! Per-adapter call pacing.
//!
//! A [`CallPacer`] enforces a minimum interval between consecutive upstream
//! calls with a `governor` limiter and adds fixed pauses after every N calls.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Sleep `pause` after every `every` completed calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPause {
    pub every: u64,
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacingPolicy {
    /// Minimum spacing between two calls; zero disables the limiter.
    pub min_interval: Duration,
    pub batch_pauses: Vec<BatchPause>,
    /// Extra wait after the upstream reports throttling.
    pub rate_limit_backoff: Duration,
}

impl PacingPolicy {
    /// Alpha Vantage free tier: 5 calls per minute.
    pub fn alpha_vantage() -> Self {
        Self {
            min_interval: Duration::from_secs(12),
            batch_pauses: Vec::new(),
            rate_limit_backoff: Duration::ZERO,
        }
    }

    pub fn yahoo() -> Self {
        Self {
            min_interval: Duration::ZERO,
            batch_pauses: vec![
                BatchPause {
                    every: 5,
                    pause: Duration::from_secs(2),
                },
                BatchPause {
                    every: 20,
                    pause: Duration::from_secs(5),
                },
            ],
            rate_limit_backoff: Duration::from_secs(10),
        }
    }

    /// No waiting at all; used by tests and offline runs.
    pub fn unpaced() -> Self {
        Self::default()
    }

    /// Total pause owed after the `completed`-th call.
    pub fn pause_after(&self, completed: u64) -> Duration {
        self.batch_pauses
            .iter()
            .filter(|rule| rule.every > 0 && completed > 0 && completed % rule.every == 0)
            .map(|rule| rule.pause)
            .sum()
    }
}

#[derive(Clone)]
pub struct CallPacer {
    policy: PacingPolicy,
    limiter: Option<Arc<DirectRateLimiter>>,
    completed: Arc<AtomicU64>,
}

impl CallPacer {
    pub fn new(policy: PacingPolicy) -> Self {
        let limiter = Quota::with_period(policy.min_interval)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self {
            policy,
            limiter,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Wait until the minimum interval since the previous call has passed.
    pub async fn before_call(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                tracing::debug!(
                    interval_ms = self.policy.min_interval.as_millis() as u64,
                    "waiting for upstream call interval"
                );
                limiter.until_ready().await;
            }
        }
    }

    /// Count a finished ticker and take any batch pause that falls due.
    pub async fn after_call(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let pause = self.policy.pause_after(completed);
        if !pause.is_zero() {
            tracing::debug!(completed, pause_ms = pause.as_millis() as u64, "batch pause");
            tokio::time::sleep(pause).await;
        }
    }

    /// Back off after the upstream answered with a throttling status.
    pub async fn after_rate_limit(&self) {
        let backoff = self.policy.rate_limit_backoff;
        if !backoff.is_zero() {
            tracing::info!(backoff_ms = backoff.as_millis() as u64, "upstream throttled, backing off");
            tokio::time::sleep(backoff).await;
        }
    }

    pub fn completed_calls(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn yahoo_pauses_stack_on_shared_multiples() {
        let policy = PacingPolicy::yahoo();
        assert_eq!(policy.pause_after(1), Duration::ZERO);
        assert_eq!(policy.pause_after(5), Duration::from_secs(2));
        assert_eq!(policy.pause_after(15), Duration::from_secs(2));
        assert_eq!(policy.pause_after(20), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn unpaced_calls_do_not_wait() {
        let pacer = CallPacer::new(PacingPolicy::unpaced());
        let started = Instant::now();
        for _ in 0..10 {
            pacer.before_call().await;
            pacer.after_call().await;
        }
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(pacer.completed_calls(), 10);
    }

    #[tokio::test]
    async fn min_interval_spaces_consecutive_calls() {
        let pacer = CallPacer::new(PacingPolicy {
            min_interval: Duration::from_millis(60),
            ..PacingPolicy::default()
        });

        let started = Instant::now();
        pacer.before_call().await;
        pacer.before_call().await;
        pacer.before_call().await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
