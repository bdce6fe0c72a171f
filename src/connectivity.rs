//! Reachability check for both upstream providers plus a snapshot of local
//! cache and rate-limit state.

use crate::cache::{CacheStats, CacheStore};
use crate::providers::{MarketDataProvider, PriceProvider};
use crate::rate_limiter::{RateLimitSnapshot, RateLimiter};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub name: &'static str,
    pub reachable: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectivityReport {
    pub probes: Vec<ProbeResult>,
    pub cache: Option<CacheStats>,
    pub rate_limits: Vec<RateLimitSnapshot>,
}

impl ConnectivityReport {
    pub fn all_reachable(&self) -> bool {
        self.probes.iter().all(|p| p.reachable)
    }
}

async fn probe<F>(name: &'static str, fut: F) -> ProbeResult
where
    F: std::future::Future<Output = crate::error::Result<()>>,
{
    let started = Instant::now();
    let outcome = fut.await;
    let latency_ms = started.elapsed().as_millis();
    match outcome {
        Ok(()) => {
            info!(provider = name, latency_ms, "provider reachable");
            ProbeResult {
                name,
                reachable: true,
                latency_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!(provider = name, error = %e, "provider unreachable");
            ProbeResult {
                name,
                reachable: false,
                latency_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Probes both providers concurrently. Probes bypass the rate limiter and
/// the cache; they are single cheap requests.
pub async fn run(
    prices: &dyn PriceProvider,
    market_data: &dyn MarketDataProvider,
    cache: &CacheStore,
    limiter: &RateLimiter,
) -> ConnectivityReport {
    let (price_probe, market_probe) = futures::join!(
        probe("price history (Yahoo)", prices.ping()),
        probe("market data (CoinGecko)", market_data.ping()),
    );

    let cache = match cache.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "cache stats unavailable");
            None
        }
    };

    ConnectivityReport {
        probes: vec![price_probe, market_probe],
        cache,
        rate_limits: limiter.snapshot(),
    }
}
