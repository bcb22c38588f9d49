// =============================================================================
// Shared types used across the screener
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV candle from the futures kline endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// High-low range of the bar.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Open interest for one symbol: the live value plus the older of the two most
/// recent history samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestSnapshot {
    pub previous: f64,
    pub current: f64,
}

/// Everything the signal evaluator established about a qualifying
/// symbol/interval pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifiedSignal {
    pub previous_open_interest: f64,
    pub current_open_interest: f64,
    pub interest_growth_percent: f64,
    pub cumulative_delta: f64,
    pub total_buy_volume: f64,
    pub total_sell_volume: f64,
    /// `cumulative_delta / total_buy_volume * 100`.
    pub delta_dominance_percent: f64,
    /// `f64::INFINITY` when no sell volume was estimated.
    pub buy_to_sell_ratio: f64,
}

/// A fully assembled signal, handed to the notification worker and then
/// dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    pub symbol: String,
    pub interval: String,
    pub previous_open_interest: f64,
    pub current_open_interest: f64,
    pub interest_growth_percent: f64,
    pub cumulative_delta: f64,
    pub total_buy_volume: f64,
    pub total_sell_volume: f64,
    pub delta_dominance_percent: f64,
    pub buy_to_sell_ratio: f64,
    pub current_price: Option<f64>,
    pub detected_at: DateTime<Utc>,
}

impl SignalReport {
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        signal: QualifiedSignal,
        current_price: Option<f64>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            previous_open_interest: signal.previous_open_interest,
            current_open_interest: signal.current_open_interest,
            interest_growth_percent: signal.interest_growth_percent,
            cumulative_delta: signal.cumulative_delta,
            total_buy_volume: signal.total_buy_volume,
            total_sell_volume: signal.total_sell_volume,
            delta_dominance_percent: signal.delta_dominance_percent,
            buy_to_sell_ratio: signal.buy_to_sell_ratio,
            current_price,
            detected_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for SignalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pair: {}", self.symbol)?;
        writeln!(f, "Interval: {}", self.interval)?;
        writeln!(
            f,
            "Open interest up: {} -> {} ({:.2}% growth)",
            self.previous_open_interest, self.current_open_interest, self.interest_growth_percent
        )?;
        writeln!(f, "Cumulative volume delta positive: {:.4}", self.cumulative_delta)?;
        writeln!(f, "Buy volume: {:.4}", self.total_buy_volume)?;
        writeln!(f, "Sell volume: {:.4}", self.total_sell_volume)?;
        writeln!(
            f,
            "Delta is {:.2}% of buy volume",
            self.delta_dominance_percent
        )?;
        if self.buy_to_sell_ratio.is_finite() {
            writeln!(f, "Buys exceed sells {:.2}x", self.buy_to_sell_ratio)?;
        } else {
            writeln!(f, "Buys exceed sells (no sell volume)")?;
        }
        match self.current_price {
            Some(price) => writeln!(f, "Current price: {price}")?,
            None => writeln!(f, "Current price: n/a")?,
        }
        write!(f, "Buy signal!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal(ratio: f64) -> QualifiedSignal {
        QualifiedSignal {
            previous_open_interest: 1000.0,
            current_open_interest: 1300.0,
            interest_growth_percent: 30.0,
            cumulative_delta: 800.0,
            total_buy_volume: 900.0,
            total_sell_volume: 100.0,
            delta_dominance_percent: 88.89,
            buy_to_sell_ratio: ratio,
        }
    }

    #[test]
    fn report_message_lists_core_fields() {
        let report = SignalReport::new("BTCUSDT", "15m", sample_signal(9.0), Some(64_000.5));
        let text = report.to_string();
        assert!(text.contains("Pair: BTCUSDT"));
        assert!(text.contains("Interval: 15m"));
        assert!(text.contains("1000 -> 1300 (30.00% growth)"));
        assert!(text.contains("Delta is 88.89% of buy volume"));
        assert!(text.contains("9.00x"));
        assert!(text.contains("Current price: 64000.5"));
        assert!(text.ends_with("Buy signal!"));
    }

    #[test]
    fn report_message_handles_unbounded_ratio_and_missing_price() {
        let report = SignalReport::new("ETHUSDT", "1h", sample_signal(f64::INFINITY), None);
        let text = report.to_string();
        assert!(text.contains("no sell volume"));
        assert!(text.contains("Current price: n/a"));
    }

    #[test]
    fn candle_range() {
        let c = Candle::new(0, 100.0, 110.0, 90.0, 108.0, 1000.0, 59_999);
        assert!((c.range() - 20.0).abs() < 1e-12);
    }
}
