//! Result rows produced by a screening run.

use crate::interval::Interval;
use crate::signal::StochSignal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    #[default]
    Stock,
    Crypto,
}

/// Whether the current/previous averages came from two full momentum
/// windows or from the single latest value (too little history).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowBasis {
    #[default]
    Full,
    Degenerate,
}

/// Coarse call on the momentum pair, used for crypto rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumVerdict {
    StrongBuy,
    Buy,
    Sell,
    WeakSell,
    Hold,
}

impl MomentumVerdict {
    pub fn classify(rsi_momentum: f64, sma_momentum: f64) -> Self {
        if rsi_momentum > 5.0 && sma_momentum > 0.0 {
            MomentumVerdict::StrongBuy
        } else if rsi_momentum > 0.0 && sma_momentum > 0.0 {
            MomentumVerdict::Buy
        } else if rsi_momentum < -5.0 || sma_momentum < 0.0 {
            MomentumVerdict::Sell
        } else if rsi_momentum < 0.0 {
            MomentumVerdict::WeakSell
        } else {
            MomentumVerdict::Hold
        }
    }

    pub fn confidence(&self) -> &'static str {
        match self {
            MomentumVerdict::StrongBuy | MomentumVerdict::Sell => "High",
            MomentumVerdict::Buy | MomentumVerdict::WeakSell => "Medium",
            MomentumVerdict::Hold => "Low",
        }
    }
}

impl fmt::Display for MomentumVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MomentumVerdict::StrongBuy => "STRONG BUY",
            MomentumVerdict::Buy => "BUY",
            MomentumVerdict::Sell => "SELL",
            MomentumVerdict::WeakSell => "WEAK SELL",
            MomentumVerdict::Hold => "HOLD",
        })
    }
}

/// Individual weighted-score inputs, each already normalised.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub momentum: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub stoch: f64,
}

/// One qualifying symbol from a momentum screen. Never mutated once built.
///
/// Every field defaults when missing so rows written by older versions still
/// load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningCriteriaResult {
    pub symbol: String,
    pub asset_name: Option<String>,
    pub asset_class: AssetClass,
    pub rsi: Option<f64>,
    pub sma: Option<f64>,
    pub rsi_current_avg: f64,
    pub rsi_prev_avg: f64,
    pub rsi_momentum: f64,
    pub sma_current_avg: f64,
    pub sma_prev_avg: f64,
    pub sma_momentum: f64,
    pub close_price: f64,
    pub avg_volume: f64,
    pub market_cap: f64,
    pub timeframe: Option<Interval>,
    pub momentum_days: u32,
    pub window_basis: WindowBasis,
    pub stoch_signal: Option<StochSignal>,
    pub stoch_current: Option<f64>,
    pub stoch_oversold_avg: Option<f64>,
    pub stoch_overbought_avg: Option<f64>,
    pub verdict: Option<MomentumVerdict>,
    pub score_breakdown: ScoreBreakdown,
    pub composite_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutResult {
    pub symbol: String,
    pub breakout_strength: f64,
    pub close_price: f64,
    pub recent_high: f64,
    pub volume_ratio: f64,
    pub rsi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalResult {
    pub symbol: String,
    pub reversal_strength: f64,
    pub close_price: f64,
    pub rsi: f64,
    pub recent_low: f64,
}

/// Sorts descending by `key`, keeping the input order for ties. NaN keys
/// sort last.
pub fn sort_descending<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> f64,
{
    let ordered = |row: &T| {
        let k = key(row);
        if k.is_nan() { f64::NEG_INFINITY } else { k }
    };
    rows.sort_by(|a, b| ordered(b).total_cmp(&ordered(a)));
}
