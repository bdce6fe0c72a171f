//! Seams to the upstream data providers, plus the HTTP plumbing the concrete
//! clients share.

use crate::error::{Result, ScreenerError};
use crate::interval::Period;
use crate::price_series::ColumnFrame;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Market capitalization and liquidity for one listed stock.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StockInfo {
    pub market_cap: f64,
    pub avg_volume: f64,
}

/// OHLCV history and quote metadata (the price-history provider).
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Raw column frame for `symbol`; `interval` is the provider's own
    /// interval string (see [`crate::interval::Interval::provider_interval`]).
    async fn history(&self, symbol: &str, period: &Period, interval: &str) -> Result<ColumnFrame>;

    async fn stock_info(&self, symbol: &str) -> Result<StockInfo>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;
}

/// Market caps keyed by provider asset id (the market-data aggregation
/// provider).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// One upstream request for every id in `ids`. Ids the provider does not
    /// know are absent from the returned map.
    async fn market_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>>;

    async fn ping(&self) -> Result<()>;
}

// --- HTTP plumbing ---

pub fn build_http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(ScreenerError::Http)
}

/// Maps throttling and other non-success statuses onto errors, passing
/// successful responses through.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ScreenerError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    Err(ScreenerError::Status {
        status: status.as_u16(),
        body,
    })
}

// --- Lenient number parsing ---

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v).filter(|v| v.is_finite()))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientF64Visitor)
    }

    // Yahoo wraps some numbers as {"raw": 123, "fmt": "123"}.
    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: de::MapAccess<'de>,
    {
        let mut raw = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "raw" {
                raw = map.next_value_seed(LenientSeed)?;
            } else {
                map.next_value::<de::IgnoredAny>()?;
            }
        }
        Ok(raw)
    }
}

struct LenientSeed;

impl<'de> de::DeserializeSeed<'de> for LenientSeed {
    type Value = Option<f64>;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LenientF64Visitor)
    }
}

/// Accepts numbers, numeric strings, `null` and `{"raw": n}` wrappers.
pub fn deserialize_f64_lenient<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}
