//! Per-user sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The action was accepted and recorded.
    Accepted,
    /// The action was rejected and not recorded.
    Rejected {
        /// Time until the oldest recorded action leaves the window.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Whether the action may proceed.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Allows at most `max_actions` per user in any rolling `window`.
///
/// Each user keeps an ordered queue of accepted-action timestamps. Entries
/// older than the window are pruned on every check, and users whose queue
/// becomes empty are dropped from the map. State is in memory only.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_actions: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Creates a limiter. A `max_actions` of zero rejects everything.
    #[must_use]
    pub fn new(max_actions: usize, window: Duration) -> Self {
        Self {
            max_actions,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and, if allowed, records an action for `key`.
    ///
    /// Check and record happen under one lock.
    pub async fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        self.prune(&mut windows, now);

        let entries = windows.entry(key.to_string()).or_default();
        if entries.len() >= self.max_actions {
            let retry_after = entries
                .front()
                .map_or(self.window, |oldest| {
                    (*oldest + self.window).saturating_duration_since(now)
                });
            if entries.is_empty() {
                windows.remove(key);
            }
            tracing::debug!(key, retry_after_ms = retry_after.as_millis(), "rate limited");
            return RateDecision::Rejected { retry_after };
        }

        entries.push_back(now);
        RateDecision::Accepted
    }

    /// Number of users with a non-empty window.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    fn prune(&self, windows: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
        windows.retain(|_, entries| {
            while entries
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                entries.pop_front();
            }
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rejects_after_limit_and_recovers_after_window() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));

        assert_eq!(limiter.check("u1").await, RateDecision::Accepted);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(limiter.check("u1").await, RateDecision::Accepted);
        assert_eq!(limiter.check("u1").await, RateDecision::Accepted);

        assert_eq!(
            limiter.check("u1").await,
            RateDecision::Rejected {
                retry_after: Duration::from_secs(50)
            }
        );

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(limiter.check("u1").await.is_accepted());
    }

    #[tokio::test(start_paused = true)]
    async fn rejections_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("u1").await.is_accepted());

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(10)).await;
            assert!(!limiter.check("u1").await.is_accepted());
        }

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check("u1").await.is_accepted());
    }

    #[tokio::test(start_paused = true)]
    async fn users_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("u1").await.is_accepted());
        assert!(limiter.check("u2").await.is_accepted());
        assert!(!limiter.check("u1").await.is_accepted());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_users_are_dropped() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let _ = limiter.check("u1").await;
        let _ = limiter.check("u2").await;
        assert_eq!(limiter.tracked_keys().await, 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        let _ = limiter.check("u3").await;
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_capacity_rejects_everything() {
        let limiter = SlidingWindowLimiter::new(0, Duration::from_secs(60));
        assert!(!limiter.check("u1").await.is_accepted());
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
