//! Weighted composite score over momentum, liquidity, size and the
//! Stochastic RSI signal.

use crate::results::{AssetClass, ScoreBreakdown};
use crate::signal::StochSignal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub momentum: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub stoch: f64,
    /// Average volume that maps to a full volume component.
    pub volume_ceiling: f64,
    /// Market cap that maps to a full market-cap component.
    pub market_cap_ceiling: f64,
}

impl ScoreWeights {
    pub const STOCK: ScoreWeights = ScoreWeights {
        momentum: 0.6,
        volume: 0.3,
        market_cap: 0.1,
        stoch: 0.0,
        volume_ceiling: 10_000_000.0,
        market_cap_ceiling: 100_000_000_000.0,
    };

    pub const CRYPTO: ScoreWeights = ScoreWeights {
        momentum: 0.5,
        volume: 0.3,
        market_cap: 0.0,
        stoch: 0.2,
        volume_ceiling: 1_000_000_000.0,
        market_cap_ceiling: 1.0,
    };

    pub fn for_class(class: AssetClass) -> Self {
        match class {
            AssetClass::Stock => Self::STOCK,
            AssetClass::Crypto => Self::CRYPTO,
        }
    }
}

fn clipped_ratio(value: f64, ceiling: f64) -> f64 {
    if ceiling <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / ceiling).clamp(0.0, 1.0)
}

/// Normalised components and their weighted sum.
pub fn composite_score(
    weights: &ScoreWeights,
    rsi_momentum: f64,
    sma_momentum: f64,
    avg_volume: f64,
    market_cap: f64,
    stoch_signal: Option<StochSignal>,
) -> (ScoreBreakdown, f64) {
    let breakdown = ScoreBreakdown {
        momentum: (rsi_momentum + sma_momentum) / 2.0,
        volume: clipped_ratio(avg_volume, weights.volume_ceiling),
        market_cap: clipped_ratio(market_cap, weights.market_cap_ceiling),
        stoch: stoch_signal.map(|s| s.score()).unwrap_or(0.0),
    };

    let score = breakdown.momentum * weights.momentum
        + breakdown.volume * weights.volume
        + breakdown.market_cap * weights.market_cap
        + breakdown.stoch * weights.stoch;

    (breakdown, score)
}
