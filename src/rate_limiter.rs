// =============================================================================
// Rate Limiter — fixed-window call budgets per upstream API
// =============================================================================
//
// Each API gets a {limit, window}. `allow` counts a call and says whether it
// fits in the current window; it never queues. A caller refused by `allow`
// waits with `await_reset`, which sleeps out the rest of the window and then
// starts a fresh one. Counters live behind a mutex so concurrent callers see
// consistent counts. This is advisory and in-process only.
//
// An upstream 429/418 is a separate signal: `call_with_backoff` sleeps out
// the provider's Retry-After (or the local window when it sent none) and
// retries the call once.
// =============================================================================

use crate::error::{Result, ScreenerError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const COINGECKO: &str = "coingecko";
pub const YAHOO: &str = "yahoo";

/// Upper bound on an upstream Retry-After we are willing to sleep.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Budget for one API: at most `limit` calls per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateBudget {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug)]
struct RateLimitState {
    budget: RateBudget,
    call_count: u32,
    window_start: Instant,
}

impl RateLimitState {
    fn roll_window(&mut self, now: Instant) {
        if now.duration_since(self.window_start) > self.budget.window() {
            self.call_count = 0;
            self.window_start = now;
        }
    }
}

/// Serialisable view of one API's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub api: String,
    pub calls: u32,
    pub limit: u32,
    pub window_secs: u64,
    pub remaining_window_secs: f64,
}

pub struct RateLimiter {
    apis: Mutex<HashMap<String, RateLimitState>>,
}

impl RateLimiter {
    pub fn new<I, S>(budgets: I) -> Self
    where
        I: IntoIterator<Item = (S, RateBudget)>,
        S: Into<String>,
    {
        let now = Instant::now();
        let apis = budgets
            .into_iter()
            .map(|(name, budget)| {
                (
                    name.into(),
                    RateLimitState {
                        budget,
                        call_count: 0,
                        window_start: now,
                    },
                )
            })
            .collect();
        Self {
            apis: Mutex::new(apis),
        }
    }

    /// Counts one call against `api` and returns whether it fits the current
    /// window. APIs without a budget are always allowed.
    pub fn allow(&self, api: &str) -> bool {
        let mut apis = self.apis.lock();
        let Some(state) = apis.get_mut(api) else {
            return true;
        };

        let now = Instant::now();
        state.roll_window(now);

        if state.call_count < state.budget.limit {
            state.call_count += 1;
            debug!(api, calls = state.call_count, limit = state.budget.limit, "rate-limit call counted");
            true
        } else {
            let wait = state
                .budget
                .window()
                .saturating_sub(now.duration_since(state.window_start));
            warn!(
                api,
                limit = state.budget.limit,
                wait_secs = wait.as_secs_f64(),
                "rate limit exhausted"
            );
            false
        }
    }

    /// Waits until the current window for `api` has elapsed, then resets its
    /// counter and starts a new window.
    pub async fn await_reset(&self, api: &str) {
        let wait = {
            let apis = self.apis.lock();
            match apis.get(api) {
                Some(state) => state
                    .budget
                    .window()
                    .saturating_sub(Instant::now().duration_since(state.window_start)),
                None => return,
            }
        };

        if !wait.is_zero() {
            info!(api, wait_secs = wait.as_secs_f64(), "waiting for rate-limit window");
            tokio::time::sleep(wait).await;
        }

        let mut apis = self.apis.lock();
        if let Some(state) = apis.get_mut(api) {
            state.call_count = 0;
            state.window_start = Instant::now();
        }
    }

    /// `allow`, falling back to `await_reset` and counting the call in the
    /// fresh window.
    pub async fn acquire(&self, api: &str) {
        if !self.allow(api) {
            self.await_reset(api).await;
            self.allow(api);
        }
    }

    /// Runs `call` against `api`'s budget. When the upstream answers with
    /// its own rate limit, waits it out and retries exactly once.
    pub async fn call_with_backoff<T, F, Fut>(&self, api: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.acquire(api).await;
        match call().await {
            Err(ScreenerError::RateLimited { retry_after }) => {
                match retry_after {
                    Some(wait) => {
                        let wait = wait.min(MAX_RETRY_AFTER);
                        warn!(api, wait_secs = wait.as_secs_f64(), "upstream rate limit; backing off");
                        tokio::time::sleep(wait).await;
                    }
                    None => {
                        warn!(api, "upstream rate limit without Retry-After; waiting for the window");
                        self.await_reset(api).await;
                    }
                }
                self.acquire(api).await;
                call().await
            }
            other => other,
        }
    }

    pub fn snapshot(&self) -> Vec<RateLimitSnapshot> {
        let apis = self.apis.lock();
        let now = Instant::now();
        let mut out: Vec<RateLimitSnapshot> = apis
            .iter()
            .map(|(api, state)| RateLimitSnapshot {
                api: api.clone(),
                calls: state.call_count,
                limit: state.budget.limit,
                window_secs: state.budget.window_secs,
                remaining_window_secs: state
                    .budget
                    .window()
                    .saturating_sub(now.duration_since(state.window_start))
                    .as_secs_f64(),
            })
            .collect();
        out.sort_by(|a, b| a.api.cmp(&b.api));
        out
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("apis", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(limit: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new([("api", RateBudget { limit, window_secs })])
    }

    #[tokio::test(start_paused = true)]
    async fn limit_calls_pass_then_refuse() {
        let limiter = limiter(3, 60);
        assert!(limiter.allow("api"));
        assert!(limiter.allow("api"));
        assert!(limiter.allow("api"));
        assert!(!limiter.allow("api"));
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_over_after_duration() {
        let limiter = limiter(2, 60);
        assert!(limiter.allow("api"));
        assert!(limiter.allow("api"));
        assert!(!limiter.allow("api"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.allow("api"));
    }

    #[tokio::test(start_paused = true)]
    async fn await_reset_sleeps_out_the_window() {
        let limiter = limiter(1, 60);
        assert!(limiter.allow("api"));
        assert!(!limiter.allow("api"));

        let start = Instant::now();
        limiter.await_reset("api").await;
        assert!(start.elapsed() >= Duration::from_secs(59));
        assert!(limiter.allow("api"));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_counts_the_call_after_waiting() {
        let limiter = limiter(1, 10);
        limiter.acquire("api").await;
        limiter.acquire("api").await;

        let snap = limiter.snapshot();
        assert_eq!(snap[0].calls, 1);
        assert!(!limiter.allow("api"));
    }

    #[tokio::test]
    async fn unknown_apis_are_unlimited() {
        let limiter = limiter(0, 60);
        assert!(limiter.allow("other"));
        limiter.await_reset("other").await;
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_throttle_is_retried_once_after_retry_after() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limiter = limiter(10, 60);
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let start = Instant::now();

        let out = limiter
            .call_with_backoff("api", move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(ScreenerError::RateLimited {
                        retry_after: Some(Duration::from_secs(7)),
                    }),
                    n => Ok(n),
                }
            })
            .await
            .unwrap();

        assert_eq!(out, 1);
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert_eq!(limiter.snapshot()[0].calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_without_retry_after_waits_for_the_window() {
        let limiter = limiter(10, 30);
        let start = Instant::now();

        let out: Result<()> = limiter
            .call_with_backoff("api", || async { Err(ScreenerError::RateLimited { retry_after: None }) })
            .await;

        assert!(matches!(out, Err(ScreenerError::RateLimited { .. })));
        assert!(start.elapsed() >= Duration::from_secs(29));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let limiter = limiter(10, 60);
        let out: Result<()> = limiter
            .call_with_backoff("api", || async { Err(ScreenerError::Empty("X".into())) })
            .await;
        assert!(matches!(out, Err(ScreenerError::Empty(_))));
        assert_eq!(limiter.snapshot()[0].calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_budget() {
        let limiter = Arc::new(limiter(50, 60));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.allow("api") })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }
}
