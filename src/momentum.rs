//! Momentum-window arithmetic: how many bars make up one comparison window,
//! the current/previous window averages, and the screening criteria that are
//! applied to them.

use crate::indicators::IndicatorSet;
use crate::interval::Interval;
use crate::results::{AssetClass, WindowBasis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exactly one criterion decides whether a stock row qualifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria {
    /// Latest RSI below the threshold.
    RsiOnly,
    /// Latest RSI below the threshold and close above the SMA.
    TrendUp,
    /// Both RSI and SMA momentum positive.
    #[default]
    RsiMomentum,
}

impl FromStr for Criteria {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsi_only" | "rsi-only" => Ok(Criteria::RsiOnly),
            "trend_up" | "trend-up" | "trend_naik" => Ok(Criteria::TrendUp),
            "rsi_momentum" | "rsi-momentum" => Ok(Criteria::RsiMomentum),
            other => Err(format!("unknown criteria '{}'", other)),
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Criteria::RsiOnly => "rsi_only",
            Criteria::TrendUp => "trend_up",
            Criteria::RsiMomentum => "rsi_momentum",
        })
    }
}

/// What to do with a series shorter than two full momentum windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientHistory {
    /// Drop the symbol from the batch.
    #[default]
    Exclude,
    /// Use the latest RSI/SMA as both averages, giving zero momentum, and
    /// mark the row [`WindowBasis::Degenerate`].
    Degrade,
}

/// Bars per momentum window.
///
/// Weekly stock bars compare the current week against the previous one,
/// whatever `momentum_days` says. Weekly crypto bars use one candle per
/// seven days, never fewer than one.
pub fn candles_per_period(interval: Interval, momentum_days: u32, class: AssetClass) -> usize {
    let days = momentum_days as usize;
    match (interval.bars_per_day(), class) {
        (Some(per_day), _) => days * per_day,
        (None, AssetClass::Stock) => 1,
        (None, AssetClass::Crypto) => (days / 7).max(1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumWindows {
    pub rsi_current_avg: f64,
    pub rsi_prev_avg: f64,
    pub sma_current_avg: f64,
    pub sma_prev_avg: f64,
    pub basis: WindowBasis,
}

impl MomentumWindows {
    pub fn rsi_momentum(&self) -> f64 {
        self.rsi_current_avg - self.rsi_prev_avg
    }

    pub fn sma_momentum(&self) -> f64 {
        self.sma_current_avg - self.sma_prev_avg
    }
}

/// Mean of the defined values in `values`; `None` if there are none.
fn defined_mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Averages of the last `candles` bars against the `candles` before them.
///
/// Returns `None` when history is short and the policy is `Exclude`, or when
/// a window holds no defined indicator value at all.
pub fn momentum_windows(
    indicators: &IndicatorSet,
    candles: usize,
    policy: InsufficientHistory,
) -> Option<MomentumWindows> {
    let len = indicators.len();
    let candles = candles.max(1);

    if len < candles * 2 {
        return match policy {
            InsufficientHistory::Exclude => None,
            InsufficientHistory::Degrade => {
                let rsi = indicators.latest_rsi()?;
                let sma = indicators.latest_sma()?;
                Some(MomentumWindows {
                    rsi_current_avg: rsi,
                    rsi_prev_avg: rsi,
                    sma_current_avg: sma,
                    sma_prev_avg: sma,
                    basis: WindowBasis::Degenerate,
                })
            }
        };
    }

    let current = len - candles..len;
    let previous = len - candles * 2..len - candles;

    Some(MomentumWindows {
        rsi_current_avg: defined_mean(&indicators.rsi[current.clone()])?,
        rsi_prev_avg: defined_mean(&indicators.rsi[previous.clone()])?,
        sma_current_avg: defined_mean(&indicators.sma[current])?,
        sma_prev_avg: defined_mean(&indicators.sma[previous])?,
        basis: WindowBasis::Full,
    })
}

/// Applies `criteria` to the latest readings and the momentum pair.
pub fn passes(
    criteria: Criteria,
    rsi_threshold: f64,
    latest_rsi: f64,
    latest_sma: f64,
    close: f64,
    windows: &MomentumWindows,
) -> bool {
    match criteria {
        Criteria::RsiOnly => latest_rsi < rsi_threshold,
        Criteria::TrendUp => latest_rsi < rsi_threshold && close > latest_sma,
        Criteria::RsiMomentum => windows.rsi_momentum() > 0.0 && windows.sma_momentum() > 0.0,
    }
}
