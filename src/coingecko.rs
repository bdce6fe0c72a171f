//! Market-data aggregation provider backed by the CoinGecko public API.

use crate::error::{Result, ScreenerError};
use crate::providers::{MarketDataProvider, check_status, deserialize_f64_lenient};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Deserialize, Debug)]
struct SimplePrice {
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    usd_market_cap: Option<f64>,
}

fn market_caps_from(body: HashMap<String, SimplePrice>) -> HashMap<String, f64> {
    body.into_iter()
        .map(|(id, price)| (id, price.usd_market_cap.unwrap_or(0.0)))
        .collect()
}

pub struct CoinGeckoClient {
    client: Client,
}

impl CoinGeckoClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    async fn market_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = ids.join(",");
        debug!(ids = %joined, "requesting market caps");

        let response = self
            .client
            .get(format!("{}/simple/price", BASE_URL))
            .query(&[
                ("ids", joined.as_str()),
                ("vs_currencies", "usd"),
                ("include_market_cap", "true"),
            ])
            .send()
            .await?;
        let body: HashMap<String, SimplePrice> = check_status(response).await?.json().await?;

        Ok(market_caps_from(body))
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/coins/bitcoin/market_chart", BASE_URL))
            .query(&[("vs_currency", "usd"), ("days", "1"), ("interval", "daily")])
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;

        if body.get("prices").is_some() {
            Ok(())
        } else {
            Err(ScreenerError::Empty("bitcoin market chart".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_price_body_maps_to_market_caps() {
        let json = r#"{
            "bitcoin": {"usd": 65000.0, "usd_market_cap": 1280000000000.5},
            "tron": {"usd": 0.12},
            "stellar": {"usd": 0.1, "usd_market_cap": null}
        }"#;
        let body: HashMap<String, SimplePrice> = serde_json::from_str(json).unwrap();
        let caps = market_caps_from(body);

        assert_eq!(caps["bitcoin"], 1_280_000_000_000.5);
        assert_eq!(caps["tron"], 0.0);
        assert_eq!(caps["stellar"], 0.0);
    }
}
