//! Price-history provider backed by the Yahoo Finance chart and quote
//! endpoints.

use crate::error::{Result, ScreenerError};
use crate::interval::Period;
use crate::price_series::ColumnFrame;
use crate::providers::{PriceProvider, StockInfo, check_status, deserialize_f64_lenient};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

const BASE_URL: &str = "https://query1.finance.yahoo.com";

// --- Wire format ---

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize, Debug)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteSummary>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummary {
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    average_daily_volume3_month: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    average_daily_volume10_day: Option<f64>,
}

fn chart_to_frame(symbol: &str, envelope: ChartEnvelope) -> Result<ColumnFrame> {
    if let Some(err) = envelope.chart.error {
        return Err(ScreenerError::Parse(format!(
            "{}: {} {}",
            symbol, err.code, err.description
        )));
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ScreenerError::Empty(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    if result.timestamp.is_empty() || quote.close.is_empty() {
        return Err(ScreenerError::Empty(symbol.to_string()));
    }

    let date = result
        .timestamp
        .iter()
        .map(|ts| {
            DateTime::from_timestamp(*ts, 0)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default()
        })
        .collect();

    let mut columns = BTreeMap::new();
    columns.insert("open".to_string(), quote.open);
    columns.insert("high".to_string(), quote.high);
    columns.insert("low".to_string(), quote.low);
    columns.insert("close".to_string(), quote.close);
    columns.insert("volume".to_string(), quote.volume);

    Ok(ColumnFrame { date, columns })
}

// --- Client ---

pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceProvider for YahooClient {
    async fn history(&self, symbol: &str, period: &Period, interval: &str) -> Result<ColumnFrame> {
        let url = format!("{}/v8/finance/chart/{}", BASE_URL, symbol);
        debug!(symbol, %period, interval, "requesting chart");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", period.as_str()),
                ("interval", interval),
                ("includePrePost", "false"),
            ])
            .send()
            .await?;
        let envelope: ChartEnvelope = check_status(response).await?.json().await?;

        chart_to_frame(symbol, envelope)
    }

    async fn stock_info(&self, symbol: &str) -> Result<StockInfo> {
        let url = format!("{}/v7/finance/quote", BASE_URL);
        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbol)])
            .send()
            .await?;
        let envelope: QuoteEnvelope = check_status(response).await?.json().await?;

        let summary = envelope
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ScreenerError::Empty(symbol.to_string()))?;

        Ok(StockInfo {
            market_cap: summary.market_cap.unwrap_or(0.0),
            avg_volume: summary
                .average_daily_volume3_month
                .or(summary.average_daily_volume10_day)
                .unwrap_or(0.0),
        })
    }

    async fn ping(&self) -> Result<()> {
        let period: Period = "5d"
            .parse()
            .map_err(ScreenerError::Config)?;
        self.history("BTC-USD", &period, "1d").await.map(|_| ())
    }
}
