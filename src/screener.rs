//! Batch screens: momentum (stocks and crypto), breakout and reversal.
//!
//! Every screen walks its symbols one at a time. A symbol that cannot be
//! fetched or has too little history is skipped; only an empty symbol list
//! ends a batch early.

use crate::config::ScreeningConfig;
use crate::fetcher::PriceHistoryFetcher;
use crate::indicators::{self, IndicatorSet, StochParams};
use crate::interval::Interval;
use crate::market_cap::MarketCapResolver;
use crate::momentum::{self, Criteria, InsufficientHistory, MomentumWindows};
use crate::pacing::PacingPolicy;
use crate::price_series::PriceSeries;
use crate::registry::{self, CryptoAsset};
use crate::results::{
    AssetClass, BreakoutResult, MomentumVerdict, ReversalResult, ScreeningCriteriaResult,
    sort_descending,
};
use crate::results_store::ResultsStore;
use crate::scoring::{ScoreWeights, composite_score};
use crate::signal::{self, SignalReading};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Series must be longer than this to be screened at all.
const MIN_BARS: usize = 20;
/// Bars in the crypto average-volume window.
const CRYPTO_VOLUME_BARS: usize = 30;

#[derive(Debug, Clone)]
pub struct StockScreenRequest {
    pub symbols: Vec<String>,
    pub interval: Interval,
    pub momentum_days: u32,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub rsi_threshold: f64,
    pub min_volume: f64,
    pub min_market_cap: f64,
    pub criteria: Criteria,
}

impl StockScreenRequest {
    pub fn from_config(symbols: Vec<String>, config: &ScreeningConfig) -> Self {
        Self {
            symbols,
            interval: config.interval,
            momentum_days: config.momentum_days,
            rsi_period: config.rsi_period,
            sma_period: config.sma_period,
            rsi_threshold: config.rsi_threshold,
            min_volume: config.min_volume,
            min_market_cap: config.min_market_cap,
            criteria: config.criteria,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CryptoScreenRequest {
    /// Registry tickers such as `BTC`; unknown tickers are skipped.
    pub tickers: Vec<String>,
    pub interval: Interval,
    pub momentum_days: u32,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub rsi_threshold: f64,
    /// `None` ranks every asset that could be analysed.
    pub criteria: Option<Criteria>,
}

impl CryptoScreenRequest {
    pub fn from_config(tickers: Vec<String>, config: &ScreeningConfig) -> Self {
        Self {
            tickers,
            interval: config.interval,
            momentum_days: config.momentum_days,
            rsi_period: config.rsi_period,
            sma_period: config.sma_period,
            rsi_threshold: config.rsi_threshold,
            criteria: None,
        }
    }
}

/// Indicator readings for one series that a momentum row is built from.
struct Analysis {
    latest_rsi: f64,
    latest_sma: f64,
    close: f64,
    windows: MomentumWindows,
    stoch: Option<SignalReading>,
}

pub struct Screener {
    fetcher: Arc<PriceHistoryFetcher>,
    market_caps: Arc<MarketCapResolver>,
    results: Arc<ResultsStore>,
    pacing: Arc<dyn PacingPolicy>,
    stoch_params: StochParams,
    signal_lookback: usize,
    insufficient_history: InsufficientHistory,
}

impl Screener {
    pub fn new(
        fetcher: Arc<PriceHistoryFetcher>,
        market_caps: Arc<MarketCapResolver>,
        results: Arc<ResultsStore>,
        pacing: Arc<dyn PacingPolicy>,
    ) -> Self {
        Self {
            fetcher,
            market_caps,
            results,
            pacing,
            stoch_params: StochParams::default(),
            signal_lookback: signal::DEFAULT_LOOKBACK,
            insufficient_history: InsufficientHistory::default(),
        }
    }

    pub fn with_signal_lookback(mut self, lookback: usize) -> Self {
        self.signal_lookback = lookback;
        self
    }

    pub fn with_insufficient_history(mut self, policy: InsufficientHistory) -> Self {
        self.insufficient_history = policy;
        self
    }

    fn analyse(
        &self,
        symbol: &str,
        series: &PriceSeries,
        rsi_period: usize,
        sma_period: usize,
        candles: usize,
    ) -> Option<Analysis> {
        let indicators = IndicatorSet::compute(series, rsi_period, sma_period, self.stoch_params);
        let (Some(latest_rsi), Some(latest_sma), Some(last)) =
            (indicators.latest_rsi(), indicators.latest_sma(), series.last())
        else {
            debug!(symbol, "latest indicators undefined");
            return None;
        };

        let Some(windows) = momentum::momentum_windows(&indicators, candles, self.insufficient_history) else {
            debug!(symbol, bars = series.len(), needed = candles * 2, "insufficient history for momentum windows");
            return None;
        };

        let stoch = indicators
            .stoch_avg()
            .map(|avg| signal::analyze(avg, self.signal_lookback));

        Some(Analysis {
            latest_rsi,
            latest_sma,
            close: last.close,
            windows,
            stoch,
        })
    }

    fn build_row(
        symbol: &str,
        class: AssetClass,
        analysis: &Analysis,
        avg_volume: f64,
        market_cap: f64,
        interval: Interval,
        momentum_days: u32,
    ) -> ScreeningCriteriaResult {
        let w = &analysis.windows;
        let stoch_signal = analysis.stoch.map(|r| r.signal);
        let (score_breakdown, composite) = composite_score(
            &ScoreWeights::for_class(class),
            w.rsi_momentum(),
            w.sma_momentum(),
            avg_volume,
            market_cap,
            stoch_signal,
        );

        ScreeningCriteriaResult {
            symbol: symbol.to_string(),
            asset_name: None,
            asset_class: class,
            rsi: Some(analysis.latest_rsi),
            sma: Some(analysis.latest_sma),
            rsi_current_avg: w.rsi_current_avg,
            rsi_prev_avg: w.rsi_prev_avg,
            rsi_momentum: w.rsi_momentum(),
            sma_current_avg: w.sma_current_avg,
            sma_prev_avg: w.sma_prev_avg,
            sma_momentum: w.sma_momentum(),
            close_price: analysis.close,
            avg_volume,
            market_cap,
            timeframe: Some(interval),
            momentum_days,
            window_basis: w.basis,
            stoch_signal,
            stoch_current: analysis.stoch.and_then(|r| r.current),
            stoch_oversold_avg: analysis.stoch.and_then(|r| r.oversold_avg),
            stoch_overbought_avg: analysis.stoch.and_then(|r| r.overbought_avg),
            verdict: None,
            score_breakdown,
            composite_score: composite,
        }
    }

    async fn persist(&self, rows: &[ScreeningCriteriaResult]) {
        if let Err(e) = self.results.save_batch(rows).await {
            error!(rows = rows.len(), error = %e, "failed to persist screening results");
        }
    }

    /// Momentum screen over stocks, ranked by composite score.
    pub async fn screen_stocks(&self, request: &StockScreenRequest) -> anyhow::Result<Vec<ScreeningCriteriaResult>> {
        if request.symbols.is_empty() {
            anyhow::bail!("no stock symbols to screen");
        }

        let period = request.interval.stock_period();
        let candles = momentum::candles_per_period(request.interval, request.momentum_days, AssetClass::Stock);
        info!(
            symbols = request.symbols.len(),
            interval = %request.interval,
            criteria = %request.criteria,
            candles,
            "screening stocks"
        );

        let mut rows = Vec::new();
        for symbol in &request.symbols {
            let stock_info = self.fetcher.stock_info(symbol).await;
            if stock_info.avg_volume < request.min_volume || stock_info.market_cap < request.min_market_cap {
                debug!(symbol, avg_volume = stock_info.avg_volume, market_cap = stock_info.market_cap, "filtered out");
                continue;
            }

            let Some(series) = self.fetcher.fetch(symbol, &period, request.interval).await else {
                continue;
            };
            if series.len() <= MIN_BARS {
                debug!(symbol, bars = series.len(), "too few bars");
                continue;
            }

            let Some(analysis) = self.analyse(symbol, &series, request.rsi_period, request.sma_period, candles) else {
                continue;
            };

            if !momentum::passes(
                request.criteria,
                request.rsi_threshold,
                analysis.latest_rsi,
                analysis.latest_sma,
                analysis.close,
                &analysis.windows,
            ) {
                continue;
            }

            rows.push(Self::build_row(
                symbol,
                AssetClass::Stock,
                &analysis,
                stock_info.avg_volume,
                stock_info.market_cap,
                request.interval,
                request.momentum_days,
            ));
        }

        sort_descending(&mut rows, |r| r.composite_score);
        self.persist(&rows).await;
        info!(qualified = rows.len(), "stock screen finished");
        Ok(rows)
    }

    /// Momentum screen over registry crypto assets, ranked by composite score.
    pub async fn screen_crypto(&self, request: &CryptoScreenRequest) -> anyhow::Result<Vec<ScreeningCriteriaResult>> {
        let assets: Vec<&'static CryptoAsset> = request
            .tickers
            .iter()
            .filter_map(|ticker| {
                let asset = registry::crypto_asset(ticker);
                if asset.is_none() {
                    warn!(ticker = %ticker, "unknown crypto ticker skipped");
                }
                asset
            })
            .collect();
        if assets.is_empty() {
            anyhow::bail!("no valid crypto tickers to screen");
        }

        let period = request.interval.crypto_period();
        let candles = momentum::candles_per_period(request.interval, request.momentum_days, AssetClass::Crypto);
        let ids: Vec<String> = assets.iter().map(|a| a.provider_id.to_string()).collect();
        let caps = self.market_caps.resolve(&ids).await;
        info!(assets = assets.len(), interval = %request.interval, candles, "screening crypto");

        let mut rows = Vec::new();
        for (index, asset) in assets.iter().enumerate() {
            self.pacing.before_item(index).await;

            let Some(series) = self.fetcher.fetch(asset.price_symbol, &period, request.interval).await else {
                continue;
            };
            if series.len() <= MIN_BARS {
                debug!(ticker = asset.ticker, bars = series.len(), "too few bars");
                continue;
            }

            let Some(analysis) = self.analyse(asset.ticker, &series, request.rsi_period, request.sma_period, candles)
            else {
                continue;
            };

            if let Some(criteria) = request.criteria {
                if !momentum::passes(
                    criteria,
                    request.rsi_threshold,
                    analysis.latest_rsi,
                    analysis.latest_sma,
                    analysis.close,
                    &analysis.windows,
                ) {
                    continue;
                }
            }

            let volumes = series.volumes();
            let recent = &volumes[volumes.len().saturating_sub(CRYPTO_VOLUME_BARS)..];
            let avg_volume = recent.iter().sum::<f64>() / recent.len() as f64;
            let market_cap = caps.get(asset.provider_id).copied().unwrap_or(0.0);

            let mut row = Self::build_row(
                asset.ticker,
                AssetClass::Crypto,
                &analysis,
                avg_volume,
                market_cap,
                request.interval,
                request.momentum_days,
            );
            row.asset_name = Some(asset.name.to_string());
            row.verdict = Some(MomentumVerdict::classify(row.rsi_momentum, row.sma_momentum));
            rows.push(row);
        }

        sort_descending(&mut rows, |r| r.composite_score);
        self.persist(&rows).await;
        info!(qualified = rows.len(), "crypto screen finished");
        Ok(rows)
    }

    /// Symbols closing at least 2% above the previous ten bars' high on
    /// above-average volume, ranked by how far above.
    pub async fn screen_breakout(&self, symbols: &[String], interval: Interval) -> anyhow::Result<Vec<BreakoutResult>> {
        if symbols.is_empty() {
            anyhow::bail!("no symbols to screen");
        }
        let period = interval.stock_period();
        let mut rows = Vec::new();

        for symbol in symbols {
            let Some(series) = self.fetcher.fetch(symbol, &period, interval).await else {
                continue;
            };
            if let Some(row) = breakout(symbol, &series) {
                rows.push(row);
            }
        }

        sort_descending(&mut rows, |r| r.breakout_strength);
        info!(qualified = rows.len(), "breakout screen finished");
        Ok(rows)
    }

    /// Symbols printing a bullish bar after a short decline, ranked by the
    /// size of the bounce.
    pub async fn screen_reversal(&self, symbols: &[String], interval: Interval) -> anyhow::Result<Vec<ReversalResult>> {
        if symbols.is_empty() {
            anyhow::bail!("no symbols to screen");
        }
        let period = interval.stock_period();
        let mut rows = Vec::new();

        for symbol in symbols {
            let Some(series) = self.fetcher.fetch(symbol, &period, interval).await else {
                continue;
            };
            if let Some(row) = reversal(symbol, &series) {
                rows.push(row);
            }
        }

        sort_descending(&mut rows, |r| r.reversal_strength);
        info!(qualified = rows.len(), "reversal screen finished");
        Ok(rows)
    }
}

const BREAKOUT_HIGH_BARS: usize = 10;
const BREAKOUT_VOLUME_BARS: usize = 20;
const PATTERN_RSI_PERIOD: usize = 14;
const REVERSAL_BARS: usize = 5;

fn breakout(symbol: &str, series: &PriceSeries) -> Option<BreakoutResult> {
    if series.len() <= MIN_BARS {
        return None;
    }
    let bars = series.bars();
    let (last, before) = bars.split_last()?;

    let recent_high = before[before.len() - BREAKOUT_HIGH_BARS..]
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let volume_window = &bars[bars.len() - BREAKOUT_VOLUME_BARS..];
    let avg_volume = volume_window.iter().map(|b| b.volume).sum::<f64>() / volume_window.len() as f64;
    let rsi = indicators::rsi(&series.closes(), PATTERN_RSI_PERIOD).last().copied().flatten()?;

    let price_breakout = last.close > recent_high * 1.02;
    let volume_confirm = last.volume > avg_volume * 1.2;
    if !(price_breakout && volume_confirm && rsi > 50.0) || avg_volume <= 0.0 {
        return None;
    }

    Some(BreakoutResult {
        symbol: symbol.to_string(),
        breakout_strength: (last.close / recent_high - 1.0) * 100.0,
        close_price: last.close,
        recent_high,
        volume_ratio: last.volume / avg_volume,
        rsi,
    })
}

fn reversal(symbol: &str, series: &PriceSeries) -> Option<ReversalResult> {
    if series.len() <= MIN_BARS {
        return None;
    }
    let bars = series.bars();
    let recent = &bars[bars.len() - REVERSAL_BARS..];
    let (last, prior) = recent.split_last()?;
    let first_prior = prior.first()?.close;
    let last_prior = prior.last()?.close;

    let downtrend = last_prior < first_prior;
    let bullish = last.close > last.open;
    let recent_low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let rsi = indicators::rsi(&series.closes(), PATTERN_RSI_PERIOD).last().copied().flatten()?;

    if !(downtrend && bullish && rsi > 50.0 && last.close > recent_low) {
        return None;
    }

    let change = (last.close - last_prior) / last_prior * 100.0;
    Some(ReversalResult {
        symbol: symbol.to_string(),
        reversal_strength: change.max(0.0),
        close_price: last.close,
        rsi,
        recent_low,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::error::Result;
    use crate::fetcher::tests::{MockPriceProvider, fetcher_with, limiter};
    use crate::pacing::NoPacing;
    use crate::price_series::Bar;
    use crate::price_series::tests::daily_series;
    use crate::providers::MarketDataProvider;
    use crate::signal::StochSignal;
    use crate::storage_utils::AsyncStorageManager;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    struct FixedCaps(HashMap<String, f64>);

    #[async_trait]
    impl MarketDataProvider for FixedCaps {
        async fn market_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.0.get(id).map(|c| (id.clone(), *c)))
                .collect())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    async fn screener(dir: &std::path::Path, provider: Arc<MockPriceProvider>) -> Screener {
        let fetcher = Arc::new(fetcher_with(dir, provider, false).await);
        let cache = Arc::new(CacheStore::open(dir.join("cache")).await.unwrap());
        let caps = FixedCaps(HashMap::from([("bitcoin".to_string(), 1.2e12)]));
        let resolver = Arc::new(MarketCapResolver::new(cache, limiter(), Arc::new(caps)));
        let results = Arc::new(ResultsStore::new(AsyncStorageManager::new(dir).await.unwrap()));
        Screener::new(fetcher, resolver, results, Arc::new(NoPacing))
    }

    /// Flat and choppy for 20 bars, then climbing `step` per bar.
    fn choppy_then_rising(chop: f64, step: f64) -> PriceSeries {
        let closes: Vec<f64> = (0..40)
            .map(|i| {
                if i < 20 {
                    100.0 + chop * (i % 2) as f64
                } else {
                    100.0 + chop + (i - 19) as f64 * step
                }
            })
            .collect();
        daily_series(&closes)
    }

    fn request(symbols: &[&str]) -> StockScreenRequest {
        StockScreenRequest {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            interval: Interval::OneDay,
            momentum_days: 7,
            rsi_period: 14,
            sma_period: 14,
            rsi_threshold: 40.0,
            min_volume: 1_000_000.0,
            min_market_cap: 1_000_000_000.0,
            criteria: Criteria::RsiMomentum,
        }
    }

    #[tokio::test]
    async fn rising_stocks_are_ranked_by_score() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(
            MockPriceProvider::default()
                .with_series("AAPL", &choppy_then_rising(0.5, 1.0))
                .with_series("MSFT", &choppy_then_rising(2.0, 0.5))
                .with_info("AAPL", 3e12, 5e7)
                .with_info("MSFT", 3e12, 5e7),
        );
        let screener = screener(dir.path(), provider).await;

        let rows = screener.screen_stocks(&request(&["AAPL", "MSFT"])).await.unwrap();

        assert_eq!(rows.len(), 2);
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert!(symbols.contains(&"AAPL") && symbols.contains(&"MSFT"));
        for row in &rows {
            assert!(row.rsi_momentum > 0.0, "{} rsi momentum", row.symbol);
            assert!(row.sma_momentum > 0.0, "{} sma momentum", row.symbol);
            assert_eq!(row.timeframe, Some(Interval::OneDay));
        }
        assert!(rows[0].composite_score >= rows[1].composite_score);
        assert_eq!(rows[0].symbol, "MSFT");

        let stored = screener.results.load_recent(10).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn rerun_over_cached_inputs_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(
            MockPriceProvider::default()
                .with_series("AAPL", &choppy_then_rising(0.5, 1.0))
                .with_info("AAPL", 3e12, 5e7),
        );
        let screener = screener(dir.path(), provider.clone()).await;

        let first = screener.screen_stocks(&request(&["AAPL"])).await.unwrap();
        let second = screener.screen_stocks(&request(&["AAPL"])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn coarse_filters_reject_before_fetching_history() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(
            MockPriceProvider::default()
                .with_series("TINY", &choppy_then_rising(0.5, 1.0))
                .with_info("TINY", 5e8, 5e7),
        );
        let screener = screener(dir.path(), provider.clone()).await;

        let rows = screener.screen_stocks(&request(&["TINY", "UNKNOWN"])).await.unwrap();

        assert!(rows.is_empty());
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_series_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let short = daily_series(&(0..20).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let provider = Arc::new(
            MockPriceProvider::default()
                .with_series("AAPL", &short)
                .with_info("AAPL", 3e12, 5e7),
        );
        let screener = screener(dir.path(), provider).await;

        assert!(screener.screen_stocks(&request(&["AAPL"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_symbol_list_ends_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(dir.path(), Arc::new(MockPriceProvider::default())).await;

        assert!(screener.screen_stocks(&request(&[])).await.is_err());
        let crypto = CryptoScreenRequest::from_config(vec!["NOPE".to_string()], &ScreeningConfig::default());
        assert!(screener.screen_crypto(&crypto).await.is_err());
    }

    #[tokio::test]
    async fn crypto_rows_carry_verdict_name_and_market_cap() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockPriceProvider::default().with_series("BTC-USD", &choppy_then_rising(0.5, 1.0)));
        let screener = screener(dir.path(), provider).await;

        let request = CryptoScreenRequest {
            tickers: vec!["btc".to_string(), "DOGE".to_string(), "FAKE".to_string()],
            interval: Interval::OneDay,
            momentum_days: 7,
            rsi_period: 14,
            sma_period: 14,
            rsi_threshold: 40.0,
            criteria: None,
        };
        let rows = screener.screen_crypto(&request).await.unwrap();

        assert_eq!(rows.len(), 1);
        let btc = &rows[0];
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.asset_name.as_deref(), Some("Bitcoin"));
        assert_eq!(btc.asset_class, AssetClass::Crypto);
        assert_eq!(btc.market_cap, 1.2e12);
        assert_eq!(btc.avg_volume, 1_000.0);
        assert_eq!(btc.verdict, Some(MomentumVerdict::StrongBuy));
        assert!(btc.stoch_signal.is_some());
        assert_eq!(btc.score_breakdown.market_cap, 0.0);
    }

    #[tokio::test]
    async fn degrade_policy_marks_short_windows() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockPriceProvider::default().with_series("ETH-USD", &choppy_then_rising(0.5, 1.0)));
        let screener = screener(dir.path(), provider)
            .await
            .with_insufficient_history(InsufficientHistory::Degrade);

        let mut request = CryptoScreenRequest::from_config(vec!["ETH".to_string()], &ScreeningConfig::default());
        request.momentum_days = 30;
        let rows = screener.screen_crypto(&request).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].window_basis, crate::results::WindowBasis::Degenerate);
        assert_eq!(rows[0].rsi_momentum, 0.0);
        assert_eq!(rows[0].verdict, Some(MomentumVerdict::Hold));
    }

    fn bars_from(ohlcv: &[(f64, f64, f64, f64, f64)]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            ohlcv
                .iter()
                .enumerate()
                .map(|(i, &(open, high, low, close, volume))| Bar {
                    timestamp: start + chrono::Duration::days(i as i64),
                    open,
                    high,
                    low,
                    close,
                    volume,
                })
                .collect(),
        )
    }

    #[test]
    fn breakout_above_the_prior_high_on_volume() {
        let mut bars: Vec<(f64, f64, f64, f64, f64)> = (0..29)
            .map(|i| {
                let c = 100.0 + 0.5 * (i % 2) as f64;
                (c, c + 1.0, c - 1.0, c, 1_000.0)
            })
            .collect();
        bars.push((101.0, 111.0, 100.0, 110.0, 5_000.0));

        let row = breakout("AAPL", &bars_from(&bars)).unwrap();
        assert_eq!(row.recent_high, 101.5);
        assert!((row.breakout_strength - (110.0 / 101.5 - 1.0) * 100.0).abs() < 1e-9);
        assert!((row.volume_ratio - 5_000.0 / 1_200.0).abs() < 1e-9);
        assert!(row.rsi > 50.0);

        // Same close on ordinary volume is not a breakout.
        bars.last_mut().unwrap().4 = 1_000.0;
        assert!(breakout("AAPL", &bars_from(&bars)).is_none());
    }

    #[test]
    fn bullish_bar_after_pullback_is_a_reversal() {
        let mut bars: Vec<(f64, f64, f64, f64, f64)> = (0..20)
            .map(|i| {
                let c = 100.0 + 2.0 * i as f64;
                (c - 1.0, c + 0.5, c - 1.5, c, 1_000.0)
            })
            .collect();
        for c in [137.5, 137.0, 136.5, 136.0] {
            bars.push((c + 0.5, c + 1.0, c - 0.5, c, 1_000.0));
        }
        bars.push((136.0, 138.5, 135.5, 138.0, 1_000.0));

        let row = reversal("NVDA", &bars_from(&bars)).unwrap();
        assert!((row.reversal_strength - (2.0 / 136.0) * 100.0).abs() < 1e-9);
        assert_eq!(row.recent_low, 135.5);
        assert!(row.rsi > 50.0);

        // A bearish last bar breaks the pattern.
        bars.last_mut().unwrap().0 = 139.0;
        assert!(reversal("NVDA", &bars_from(&bars)).is_none());
    }

    #[tokio::test]
    async fn breakout_screen_skips_unfetchable_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let screener = screener(dir.path(), Arc::new(MockPriceProvider::default())).await;
        let rows = screener
            .screen_breakout(&["AAPL".to_string()], Interval::OneDay)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn stoch_signal_is_reported_but_not_scored_for_stocks() {
        let analysis = Analysis {
            latest_rsi: 55.0,
            latest_sma: 100.0,
            close: 101.0,
            windows: MomentumWindows {
                rsi_current_avg: 55.0,
                rsi_prev_avg: 50.0,
                sma_current_avg: 100.0,
                sma_prev_avg: 99.0,
                basis: crate::results::WindowBasis::Full,
            },
            stoch: Some(SignalReading {
                signal: StochSignal::Buy,
                current: Some(40.0),
                oversold_avg: Some(17.0),
                overbought_avg: None,
            }),
        };
        let row = Screener::build_row("AAPL", AssetClass::Stock, &analysis, 0.0, 0.0, Interval::OneDay, 7);
        assert_eq!(row.stoch_signal, Some(StochSignal::Buy));
        assert_eq!(row.stoch_oversold_avg, Some(17.0));
        assert!((row.composite_score - 3.0 * 0.6).abs() < 1e-9);
    }
}
