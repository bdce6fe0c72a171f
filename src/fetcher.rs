//! Price-history fetch chain: cache, then the rate-limited provider, with
//! the persisted history standing in when the provider cannot be reached.

use crate::cache::{CacheStore, keys};
use crate::history_store::HistoryStore;
use crate::interval::{Interval, Period};
use crate::price_series::{ColumnFrame, PriceSeries};
use crate::providers::{PriceProvider, StockInfo};
use crate::rate_limiter::{self, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Freshness of cached stock info.
pub const STOCK_INFO_TTL: Duration = Duration::from_secs(3600);

pub struct PriceHistoryFetcher {
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn PriceProvider>,
    history: Arc<HistoryStore>,
    offline: bool,
}

impl PriceHistoryFetcher {
    pub fn new(
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn PriceProvider>,
        history: Arc<HistoryStore>,
        offline: bool,
    ) -> Self {
        Self {
            cache,
            limiter,
            provider,
            history,
            offline,
        }
    }

    /// OHLCV history for `symbol`, or `None` if no source has usable data.
    /// Failures are logged here and never propagate. A transport failure
    /// only affects this symbol; the next call asks the provider again.
    pub async fn fetch(&self, symbol: &str, period: &Period, interval: Interval) -> Option<PriceSeries> {
        let key = keys::price_history(symbol, period, interval);

        if let Some(frame) = self.cache.get::<ColumnFrame>(&key, interval.cache_ttl()).await {
            match frame.into_series(symbol) {
                Some(series) => return Some(series),
                None => debug!(symbol, key, "cached frame unusable; refetching"),
            }
        }

        if self.offline {
            return self.from_history(symbol, interval).await;
        }

        let (provider_interval, factor) = interval.provider_interval();
        let fetched = self
            .limiter
            .call_with_backoff(rate_limiter::YAHOO, move || {
                self.provider.history(symbol, period, provider_interval)
            })
            .await;

        let frame = match fetched {
            Ok(frame) => frame,
            Err(e) if e.is_transport() => {
                warn!(symbol, error = %e, "price provider unreachable; trying stored history");
                return self.from_history(symbol, interval).await;
            }
            Err(e) => {
                warn!(symbol, %interval, error = %e, "price history fetch failed");
                return None;
            }
        };

        let Some(mut series) = frame.into_series(symbol) else {
            warn!(symbol, %interval, "provider returned no usable bars");
            return None;
        };
        if factor > 1 {
            series = series.resample(interval.bar_duration().num_seconds());
        }

        self.cache.set(&key, &ColumnFrame::from_series(&series)).await;
        self.history.record(symbol, interval, &series).await;
        debug!(symbol, %interval, bars = series.len(), "fetched live history");
        Some(series)
    }

    async fn from_history(&self, symbol: &str, interval: Interval) -> Option<PriceSeries> {
        match self.history.load(symbol, interval).await {
            Ok(Some(series)) => {
                info!(symbol, %interval, bars = series.len(), "serving stored history");
                Some(series)
            }
            Ok(None) => {
                debug!(symbol, %interval, "no stored history");
                None
            }
            Err(e) => {
                warn!(symbol, %interval, error = %e, "stored history unreadable");
                None
            }
        }
    }

    /// Market cap and average volume, cached for an hour. Offline, or when
    /// the lookup fails, an expired cached entry is used; with nothing cached
    /// the result is zeros, which the coarse filters then reject.
    pub async fn stock_info(&self, symbol: &str) -> StockInfo {
        let key = keys::stock_info(symbol);
        if let Some(info) = self.cache.get::<StockInfo>(&key, STOCK_INFO_TTL).await {
            return info;
        }
        if self.offline {
            return self.stale_stock_info(&key).await;
        }

        let fetched = self
            .limiter
            .call_with_backoff(rate_limiter::YAHOO, move || self.provider.stock_info(symbol))
            .await;
        match fetched {
            Ok(info) => {
                self.cache.set(&key, &info).await;
                info
            }
            Err(e) => {
                warn!(symbol, error = %e, "stock info lookup failed");
                self.stale_stock_info(&key).await
            }
        }
    }

    async fn stale_stock_info(&self, key: &str) -> StockInfo {
        self.cache.get_stale::<StockInfo>(key).await.unwrap_or_default()
    }
}
