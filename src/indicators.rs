//! Pure indicator math over close prices.
//!
//! Every series returned here has the same length as its input. Positions
//! without enough history hold `None`, as do positions where the formula is
//! undefined (a flat RSI range, zero average gain and loss), so no NaN or
//! infinity ever reaches the comparisons downstream.

use crate::price_series::PriceSeries;

/// Stochastic RSI parameters used for signal derivation, independent of the
/// user-chosen RSI/SMA periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StochParams {
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub smooth_k: usize,
    pub smooth_d: usize,
}

impl Default for StochParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            stoch_period: 14,
            smooth_k: 3,
            smooth_d: 3,
        }
    }
}

/// Smoothed %K, %D and their mean, each aligned with the input prices.
#[derive(Debug, Clone, PartialEq)]
pub struct StochRsi {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub avg: Vec<Option<f64>>,
}

/// RSI from simple rolling means of gains and losses over `period` deltas.
/// The first `period` outputs are `None`.
pub fn rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut gain_sum: f64 = deltas[..period].iter().filter(|d| **d > 0.0).sum();
    let mut loss_sum: f64 = deltas[..period].iter().filter(|d| **d < 0.0).map(|d| -d).sum();

    for i in period..prices.len() {
        // deltas[i - 1] is the change into bar i; the window is the
        // `period` deltas ending there.
        if i > period {
            let incoming = deltas[i - 1];
            let outgoing = deltas[i - 1 - period];
            gain_sum += incoming.max(0.0) - outgoing.max(0.0);
            loss_sum += (-incoming).max(0.0) - (-outgoing).max(0.0);
        }
        out[i] = rsi_from_averages(gain_sum.max(0.0) / period_f, loss_sum.max(0.0) / period_f);
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    const EPS: f64 = 1e-12;
    if avg_loss <= EPS && avg_gain <= EPS {
        // 0 / 0: no movement inside the window.
        return None;
    }
    let rsi = if avg_loss <= EPS {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    rsi.is_finite().then(|| rsi.clamp(0.0, 100.0))
}

/// Simple moving average. The first `period - 1` outputs are `None`.
pub fn sma(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let values: Vec<Option<f64>> = prices.iter().copied().map(Some).collect();
    rolling_mean(&values, period)
}

/// Rolling mean over an optional series; a window containing any `None`
/// yields `None`.
pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_min(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn rolling<F>(values: &[Option<f64>], period: usize, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut window = Vec::with_capacity(period);
    for end in (period - 1)..values.len() {
        window.clear();
        window.extend(values[end + 1 - period..=end].iter().map_while(|v| *v));
        if window.len() == period {
            out[end] = Some(reduce(&window));
        }
    }
    out
}

/// Stochastic RSI. Returns `None` when `prices` is shorter than
/// `rsi_period + stoch_period`.
pub fn stoch_rsi(prices: &[f64], params: StochParams) -> Option<StochRsi> {
    if prices.len() < params.rsi_period + params.stoch_period {
        return None;
    }

    let rsi = rsi(prices, params.rsi_period);
    let low = rolling_min(&rsi, params.stoch_period);
    let high = rolling_max(&rsi, params.stoch_period);

    let raw_k: Vec<Option<f64>> = rsi
        .iter()
        .zip(low.iter().zip(high.iter()))
        .map(|(r, (lo, hi))| {
            let (r, lo, hi) = ((*r)?, (*lo)?, (*hi)?);
            let range = hi - lo;
            if range.abs() <= f64::EPSILON {
                None
            } else {
                Some(((r - lo) / range * 100.0).clamp(0.0, 100.0))
            }
        })
        .collect();

    let k = rolling_mean(&raw_k, params.smooth_k);
    let d = rolling_mean(&k, params.smooth_d);
    let avg = k
        .iter()
        .zip(d.iter())
        .map(|(k, d)| Some(((*k)? + (*d)?) / 2.0))
        .collect();

    Some(StochRsi { k, d, avg })
}

/// All indicators for one series, aligned bar for bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub rsi: Vec<Option<f64>>,
    pub sma: Vec<Option<f64>>,
    /// `None` when the series is too short for the Stochastic RSI at all.
    pub stoch: Option<StochRsi>,
}

impl IndicatorSet {
    pub fn compute(series: &PriceSeries, rsi_period: usize, sma_period: usize, stoch: StochParams) -> Self {
        let closes = series.closes();
        Self {
            rsi: rsi(&closes, rsi_period),
            sma: sma(&closes, sma_period),
            stoch: stoch_rsi(&closes, stoch),
        }
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().flatten()
    }

    pub fn latest_sma(&self) -> Option<f64> {
        self.sma.last().copied().flatten()
    }

    pub fn stoch_avg(&self) -> Option<&[Option<f64>]> {
        self.stoch.as_ref().map(|s| s.avg.as_slice())
    }
}
