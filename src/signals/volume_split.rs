// =============================================================================
// Candle Volume Splitter — buy/sell volume estimate from OHLCV bars
// =============================================================================
//
// Klines carry no aggressor side, so the split is a heuristic: the share of a
// bar's volume attributed to buyers is proportional to where the close sits
// inside the high-low range.
//
//   buy  = volume * (close - low) / (high - low)
//   sell = volume - buy
//
// A close at the high counts the whole bar as buying, a close at the low as
// selling. Zero-range bars have no defined split and are skipped.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::Candle;

/// Aggregate buy/sell split over a candle sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSplit {
    pub cumulative_delta: f64,
    pub total_buy_volume: f64,
    pub total_sell_volume: f64,
}

/// Estimate buy and sell volume across `candles` (input order) and accumulate
/// the running delta.
pub fn split(candles: &[Candle]) -> VolumeSplit {
    let mut out = VolumeSplit::default();

    for candle in candles {
        let range = candle.range();
        if range.is_nan() || range <= 0.0 {
            continue;
        }

        let buy = candle.volume * (candle.close - candle.low) / range;
        let sell = candle.volume - buy;

        out.total_buy_volume += buy;
        out.total_sell_volume += sell;
        out.cumulative_delta += buy - sell;
    }

    out
}
