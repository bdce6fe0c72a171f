use crate::interval::Interval;
use crate::momentum::{Criteria, InsufficientHistory};
use crate::rate_limiter::{self, RateBudget};
use crate::storage_utils::AsyncStorageManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

// CONFIGURATION STRUCTS
// Every section defaults, so a partial config.json still loads.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScreeningConfig {
    pub interval: Interval,
    pub momentum_days: u32,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub rsi_threshold: f64,
    pub min_volume: f64,     // e.g., 1_000_000 shares/day
    pub min_market_cap: f64, // e.g., 1_000_000_000 USD
    pub criteria: Criteria,
    pub insufficient_history: InsufficientHistory,
    pub signal_lookback: usize,
}

impl ScreeningConfig {
    /// Also run on the config after command-line overrides are merged in.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rsi_period == 0 || self.sma_period == 0 {
            anyhow::bail!("rsi_period and sma_period must be positive");
        }
        if self.momentum_days == 0 {
            anyhow::bail!("momentum_days must be positive");
        }
        if !(0.0..=100.0).contains(&self.rsi_threshold) {
            anyhow::bail!("rsi_threshold must lie between 0 and 100");
        }
        if self.min_volume < 0.0 || self.min_market_cap < 0.0 {
            anyhow::bail!("min_volume and min_market_cap must not be negative");
        }
        Ok(())
    }
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneDay,
            momentum_days: 7,
            rsi_period: 14,
            sma_period: 14,
            rsi_threshold: 40.0,
            min_volume: 1_000_000.0,
            min_market_cap: 1_000_000_000.0,
            criteria: Criteria::RsiMomentum,
            insufficient_history: InsufficientHistory::Exclude,
            signal_lookback: crate::signal::DEFAULT_LOOKBACK,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub coingecko: RateBudget,
    pub yahoo: RateBudget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            coingecko: RateBudget {
                limit: 30,
                window_secs: 60,
            },
            yahoo: RateBudget {
                limit: 2000,
                window_secs: 3600,
            },
        }
    }
}

impl RateLimitConfig {
    pub fn budgets(&self) -> [(&'static str, RateBudget); 2] {
        [
            (rate_limiter::COINGECKO, self.coingecko),
            (rate_limiter::YAHOO, self.yahoo),
        ]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) momentum-screener/0.1".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { delay_ms: 500 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct FetchConfig {
    /// Never call the price provider; serve from cache and stored history.
    pub offline: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_dir: String,
    pub history_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            history_dir: "history".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub screening: ScreeningConfig,
    pub rate_limits: RateLimitConfig,
    pub http: HttpConfig,
    pub pacing: PacingConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

const CONFIG_FILE: &str = "config";

impl AppConfig {
    /// Loads `config.json` from `storage`. A missing file is replaced by the
    /// defaults, which are written back so they can be edited.
    pub async fn load_or_init(storage: &AsyncStorageManager) -> anyhow::Result<Self> {
        match storage.load_optional::<AppConfig>(CONFIG_FILE).await? {
            Some(config) => {
                config.validate()?;
                Ok(config)
            }
            None => {
                let config = AppConfig::default();
                if let Err(e) = storage.save(CONFIG_FILE, &config).await {
                    warn!(error = %e, "could not write default config");
                } else {
                    info!(dir = ?storage.base_dir, "wrote default config.json");
                }
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.screening.validate()?;
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be positive");
        }
        Ok(())
    }
}
