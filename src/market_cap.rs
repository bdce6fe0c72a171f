//! Batched, cache-aware market-cap lookups for crypto assets.

use crate::cache::{CacheStore, keys};
use crate::providers::MarketDataProvider;
use crate::rate_limiter::{self, RateLimiter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const MARKET_CAP_TTL: Duration = Duration::from_secs(300);

pub struct MarketCapResolver {
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn MarketDataProvider>,
}

impl MarketCapResolver {
    pub fn new(
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            cache,
            limiter,
            provider,
        }
    }

    /// Market cap for every id in `ids`. Fresh cached values are used as-is;
    /// the rest are fetched in one upstream request. Ids that stay unresolved
    /// map to `0.0`, meaning unknown.
    pub async fn resolve(&self, ids: &[String]) -> HashMap<String, f64> {
        let mut caps = HashMap::with_capacity(ids.len());
        let mut uncached = Vec::new();

        for id in ids {
            if caps.contains_key(id) || uncached.contains(id) {
                continue;
            }
            match self.cache.get::<f64>(&keys::market_cap(id), MARKET_CAP_TTL).await {
                Some(cap) => {
                    caps.insert(id.clone(), cap);
                }
                None => uncached.push(id.clone()),
            }
        }

        if uncached.is_empty() {
            debug!(ids = ids.len(), "all market caps served from cache");
            return caps;
        }

        let wanted = &uncached;
        let fetched = self
            .limiter
            .call_with_backoff(rate_limiter::COINGECKO, move || self.provider.market_caps(wanted))
            .await;
        match fetched {
            Ok(fetched) => {
                for id in &uncached {
                    if let Some(cap) = fetched.get(id).copied().filter(|c| *c > 0.0) {
                        self.cache.set(&keys::market_cap(id), &cap).await;
                        caps.insert(id.clone(), cap);
                    }
                }
            }
            Err(e) => {
                warn!(ids = uncached.len(), error = %e, "batched market-cap lookup failed");
            }
        }

        for id in uncached {
            caps.entry(id).or_insert(0.0);
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScreenerError};
    use crate::fetcher::tests::limiter;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockMarketData {
        caps: HashMap<String, f64>,
        fail: bool,
        throttled: AtomicUsize,
        requests: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl MarketDataProvider for MockMarketData {
        async fn market_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
            self.requests.lock().push(ids.to_vec());
            if self.throttled.load(Ordering::SeqCst) > 0 {
                self.throttled.fetch_sub(1, Ordering::SeqCst);
                return Err(ScreenerError::RateLimited {
                    retry_after: Some(Duration::from_millis(10)),
                });
            }
            if self.fail {
                return Err(ScreenerError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(ids
                .iter()
                .filter_map(|id| self.caps.get(id).map(|c| (id.clone(), *c)))
                .collect())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn only_uncached_ids_go_upstream_in_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open(dir.path()).await.unwrap());
        cache.set(&keys::market_cap("bitcoin"), &1.2e12).await;
        cache.set(&keys::market_cap("ethereum"), &4.0e11).await;

        let provider = Arc::new(MockMarketData {
            caps: HashMap::from([("solana".to_string(), 7.0e10)]),
            ..Default::default()
        });
        let resolver = MarketCapResolver::new(cache, limiter(), provider.clone());

        let caps = resolver.resolve(&ids(&["bitcoin", "ethereum", "solana"])).await;

        assert_eq!(provider.requests.lock().as_slice(), [ids(&["solana"])]);
        assert_eq!(caps.len(), 3);
        assert_eq!(caps["bitcoin"], 1.2e12);
        assert_eq!(caps["ethereum"], 4.0e11);
        assert_eq!(caps["solana"], 7.0e10);

        // Now everything is cached: no further upstream traffic.
        resolver.resolve(&ids(&["solana", "bitcoin"])).await;
        assert_eq!(provider.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_cached_values_and_zeroes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open(dir.path()).await.unwrap());
        cache.set(&keys::market_cap("bitcoin"), &1.2e12).await;

        let provider = Arc::new(MockMarketData {
            fail: true,
            ..Default::default()
        });
        let resolver = MarketCapResolver::new(cache, limiter(), provider);

        let caps = resolver.resolve(&ids(&["bitcoin", "tron"])).await;
        assert_eq!(caps["bitcoin"], 1.2e12);
        assert_eq!(caps["tron"], 0.0);
    }

    #[tokio::test]
    async fn throttled_batch_is_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheStore::open(dir.path()).await.unwrap());
        let provider = Arc::new(MockMarketData {
            caps: HashMap::from([("solana".to_string(), 7.0e10)]),
            throttled: AtomicUsize::new(1),
            ..Default::default()
        });
        let resolver = MarketCapResolver::new(cache, limiter(), provider.clone());

        let caps = resolver.resolve(&ids(&["solana"])).await;

        assert_eq!(caps["solana"], 7.0e10);
        assert_eq!(provider.requests.lock().len(), 2);
    }
}
