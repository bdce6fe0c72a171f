use serde::{Deserialize, Serialize};
use std::fmt;

pub const OVERSOLD_LEVEL: f64 = 20.0;
pub const OVERBOUGHT_LEVEL: f64 = 80.0;
pub const DEFAULT_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StochSignal {
    Buy,
    Sell,
    Hold,
}

impl StochSignal {
    /// Contribution to the composite score.
    pub fn score(&self) -> f64 {
        match self {
            StochSignal::Buy => 1.0,
            StochSignal::Sell => -1.0,
            StochSignal::Hold => 0.0,
        }
    }
}

impl fmt::Display for StochSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StochSignal::Buy => "BUY",
            StochSignal::Sell => "SELL",
            StochSignal::Hold => "HOLD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub signal: StochSignal,
    pub current: Option<f64>,
    pub oversold_avg: Option<f64>,
    pub overbought_avg: Option<f64>,
}

impl SignalReading {
    fn hold() -> Self {
        Self {
            signal: StochSignal::Hold,
            current: None,
            oversold_avg: None,
            overbought_avg: None,
        }
    }
}

/// Derives a BUY/SELL/HOLD reading from a Stochastic RSI average series.
///
/// Windows are positional. The most recent oversold (`< 20`) and overbought
/// (`> 80`) points anchor windows of the `lookback` positions ending at them,
/// and each window's mean is taken over its defined values. The current value
/// is the last position; if that is undefined the reading is HOLD. The
/// excursion may lie arbitrarily far in the past.
pub fn analyze(stoch_avg: &[Option<f64>], lookback: usize) -> SignalReading {
    let lookback = lookback.max(1);
    if stoch_avg.iter().flatten().count() < lookback + 1 {
        return SignalReading::hold();
    }

    let Some(current) = stoch_avg.last().copied().flatten() else {
        return SignalReading::hold();
    };

    let excursion_avg = |in_zone: fn(f64) -> bool| -> Option<f64> {
        let anchor = stoch_avg.iter().rposition(|v| v.is_some_and(in_zone))?;
        let start = (anchor + 1).saturating_sub(lookback);
        let window: Vec<f64> = stoch_avg[start..=anchor].iter().flatten().copied().collect();
        Some(window.iter().sum::<f64>() / window.len() as f64)
    };

    let oversold_avg = excursion_avg(|v| v < OVERSOLD_LEVEL);
    let overbought_avg = excursion_avg(|v| v > OVERBOUGHT_LEVEL);

    let signal = match (oversold_avg, overbought_avg) {
        (Some(low), _) if current > low => StochSignal::Buy,
        (_, Some(high)) if current < high => StochSignal::Sell,
        _ => StochSignal::Hold,
    };

    SignalReading {
        signal,
        current: Some(current),
        oversold_avg,
        overbought_avg,
    }
}
