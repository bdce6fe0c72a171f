mod cache;
mod coingecko;
mod config;
mod connectivity;
mod error;
mod fetcher;
mod history_store;
mod indicators;
mod interval;
mod market_cap;
mod momentum;
mod pacing;
mod price_series;
mod providers;
mod rate_limiter;
mod registry;
mod report;
mod results;
mod results_store;
mod scoring;
mod screener;
mod signal;
mod storage_utils;
mod yahoo;

use crate::cache::CacheStore;
use crate::coingecko::CoinGeckoClient;
use crate::config::AppConfig;
use crate::fetcher::PriceHistoryFetcher;
use crate::history_store::HistoryStore;
use crate::interval::Interval;
use crate::market_cap::MarketCapResolver;
use crate::momentum::Criteria;
use crate::pacing::FixedDelay;
use crate::rate_limiter::RateLimiter;
use crate::results_store::{DEFAULT_RECENT_LIMIT, ResultsStore};
use crate::screener::{CryptoScreenRequest, Screener, StockScreenRequest};
use crate::storage_utils::AsyncStorageManager;
use crate::yahoo::YahooClient;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "momentum-screener")]
#[command(about = "Momentum screener for stocks and crypto", long_about = None)]
struct Cli {
    /// Storage directory (defaults to `storage/` next to the binary)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Serve from cache and stored history only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-run overrides of the `screening` config section.
#[derive(Args, Debug, Clone, Default)]
struct MomentumArgs {
    /// Bar interval: 15m, 1h, 4h, 1d or 1W
    #[arg(short, long)]
    interval: Option<Interval>,
    /// Days in each momentum window
    #[arg(short, long)]
    days: Option<u32>,
    #[arg(long)]
    rsi_period: Option<usize>,
    #[arg(long)]
    sma_period: Option<usize>,
    #[arg(long)]
    rsi_threshold: Option<f64>,
    /// rsi_only, trend_up or rsi_momentum
    #[arg(short, long)]
    criteria: Option<Criteria>,
}

#[derive(Subcommand)]
enum Commands {
    /// Momentum screen over the NASDAQ list plus custom symbols
    Stocks {
        #[command(flatten)]
        momentum: MomentumArgs,
        /// Extra symbols, comma separated
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
        /// Screen only the given symbols
        #[arg(long)]
        only: bool,
        #[arg(long)]
        min_volume: Option<f64>,
        #[arg(long)]
        min_market_cap: Option<f64>,
    },
    /// Momentum screen over the crypto registry
    Crypto {
        #[command(flatten)]
        momentum: MomentumArgs,
        /// Registry tickers, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
    /// Breakout screen
    Breakout {
        #[arg(short, long, default_value = "1h")]
        interval: Interval,
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Trend-reversal screen
    Reversal {
        #[arg(short, long, default_value = "1h")]
        interval: Interval,
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Show the most recent stored results
    Results {
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Cache size and largest entries
    CacheStats,
    /// Delete every cache entry
    CacheClear,
    /// Delete stored screening results
    ClearResults {
        /// Also delete stored price history
        #[arg(long)]
        history: bool,
    },
    /// Probe both providers
    Connectivity,
}

/// Long-lived components, built once and shared.
struct App {
    config: AppConfig,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    history: Arc<HistoryStore>,
    results: Arc<ResultsStore>,
    yahoo: Arc<YahooClient>,
    coingecko: Arc<CoinGeckoClient>,
    screener: Screener,
}

impl App {
    async fn build(root: AsyncStorageManager, offline_flag: bool) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_or_init(&root).await?;
        config.fetch.offline |= offline_flag;

        let cache = Arc::new(CacheStore::new(root.child(&config.storage.cache_dir).await?));
        let history = Arc::new(HistoryStore::new(root.child(&config.storage.history_dir).await?));
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.budgets()));

        let http = providers::build_http_client(config.http.timeout(), &config.http.user_agent)?;
        let yahoo = Arc::new(YahooClient::new(http.clone()));
        let coingecko = Arc::new(CoinGeckoClient::new(http));

        let fetcher = Arc::new(PriceHistoryFetcher::new(
            cache.clone(),
            limiter.clone(),
            yahoo.clone(),
            history.clone(),
            config.fetch.offline,
        ));
        let resolver = Arc::new(MarketCapResolver::new(cache.clone(), limiter.clone(), coingecko.clone()));
        let results = Arc::new(ResultsStore::new(root));
        let screener = Screener::new(
            fetcher,
            resolver,
            results.clone(),
            Arc::new(FixedDelay::from_millis(config.pacing.delay_ms)),
        )
        .with_signal_lookback(config.screening.signal_lookback)
        .with_insufficient_history(config.screening.insufficient_history);

        Ok(Self {
            config,
            cache,
            limiter,
            history,
            results,
            yahoo,
            coingecko,
            screener,
        })
    }
}

impl MomentumArgs {
    fn apply(&self, config: &mut config::ScreeningConfig) {
        if let Some(v) = self.interval {
            config.interval = v;
        }
        if let Some(v) = self.days {
            config.momentum_days = v;
        }
        if let Some(v) = self.rsi_period {
            config.rsi_period = v;
        }
        if let Some(v) = self.sma_period {
            config.sma_period = v;
        }
        if let Some(v) = self.rsi_threshold {
            config.rsi_threshold = v;
        }
        if let Some(v) = self.criteria {
            config.criteria = v;
        }
    }
}

fn symbol_list(symbols: &[String], only: bool) -> Vec<String> {
    if only {
        registry::parse_symbol_list(&symbols.join(","))
    } else {
        registry::stock_universe(symbols)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let root = match &cli.storage {
        Some(dir) => AsyncStorageManager::new(dir).await?,
        None => AsyncStorageManager::new_relative("storage").await?,
    };
    info!(dir = ?root.base_dir, "using storage directory");
    let app = App::build(root, cli.offline).await?;

    match cli.command {
        Commands::Stocks {
            momentum,
            symbols,
            only,
            min_volume,
            min_market_cap,
        } => {
            let mut screening = app.config.screening.clone();
            momentum.apply(&mut screening);
            screening.min_volume = min_volume.unwrap_or(screening.min_volume);
            screening.min_market_cap = min_market_cap.unwrap_or(screening.min_market_cap);
            screening.validate()?;

            let request = StockScreenRequest::from_config(symbol_list(&symbols, only), &screening);
            println!("\n--- Screening {} stocks ({}, {}) ---", request.symbols.len(), request.interval, request.criteria);
            let rows = app.screener.screen_stocks(&request).await?;
            println!("{}", report::momentum_table(&rows));
            println!("{} qualifying stocks", rows.len());
        }
        Commands::Crypto { momentum, tickers } => {
            let mut screening = app.config.screening.clone();
            momentum.apply(&mut screening);
            screening.validate()?;

            let tickers = if tickers.is_empty() {
                registry::CRYPTO_ASSETS.iter().map(|a| a.ticker.to_string()).collect()
            } else {
                tickers
            };
            let mut request = CryptoScreenRequest::from_config(tickers, &screening);
            request.criteria = momentum.criteria;

            println!("\n--- Screening {} crypto assets ({}) ---", request.tickers.len(), request.interval);
            let rows = app.screener.screen_crypto(&request).await?;
            println!("{}", report::momentum_table(&rows));
        }
        Commands::Breakout { interval, symbols } => {
            let symbols = symbol_list(&symbols, !symbols.is_empty());
            println!("\n--- Breakout screen over {} symbols ({}) ---", symbols.len(), interval);
            let rows = app.screener.screen_breakout(&symbols, interval).await?;
            println!("{}", report::breakout_table(&rows));
        }
        Commands::Reversal { interval, symbols } => {
            let symbols = symbol_list(&symbols, !symbols.is_empty());
            println!("\n--- Reversal screen over {} symbols ({}) ---", symbols.len(), interval);
            let rows = app.screener.screen_reversal(&symbols, interval).await?;
            println!("{}", report::reversal_table(&rows));
        }
        Commands::Results { limit } => {
            let rows = app.results.load_recent(limit).await?;
            if rows.is_empty() {
                println!("No stored results.");
            } else {
                println!("{}", report::stored_results_table(&rows));
            }
        }
        Commands::CacheStats => {
            let stats = app.cache.stats().await?;
            println!(
                "{} files, {:.2} MB in {:?}",
                stats.file_count,
                stats.total_size_mb(),
                app.cache.dir()
            );
            println!("{}", report::cache_stats_table(&stats, 15));
        }
        Commands::CacheClear => {
            let removed = app.cache.clear().await?;
            println!("Removed {} cache entries.", removed);
        }
        Commands::ClearResults { history } => {
            let removed = app.results.clear().await?;
            println!("Removed {} stored results.", removed);
            if history {
                let files = app.history.clear().await?;
                println!("Removed {} stored price histories.", files);
            }
        }
        Commands::Connectivity => {
            let report = connectivity::run(
                app.yahoo.as_ref(),
                app.coingecko.as_ref(),
                &app.cache,
                &app.limiter,
            )
            .await;
            println!("{}", report::connectivity_table(&report));
            if let Some(stats) = &report.cache {
                println!("Cache: {} files, {:.2} MB", stats.file_count, stats.total_size_mb());
            }
            if !report.all_reachable() {
                anyhow::bail!("one or more providers unreachable");
            }
        }
    }

    Ok(())
}
