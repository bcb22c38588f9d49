// =============================================================================
// Signal Evaluator — conjunctive gate over volume delta and OI growth
// =============================================================================
//
// A symbol/interval qualifies only when every condition holds:
//
//   1. total buy volume  > total sell volume
//   2. cumulative delta  > 0
//   3. current OI        > previous OI
//   4. OI growth %       > interest_percentage
//   5. delta / buy * 100 > delta_percentage
//
// Degenerate inputs (zero previous OI, zero buy volume) are non-qualifying.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::open_interest::growth_percent;
use super::volume_split::VolumeSplit;
use crate::error::SignalError;
use crate::types::{OpenInterestSnapshot, QualifiedSignal};

/// Thresholds and intervals, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub delta_percentage: f64,
    pub interest_percentage: f64,
    pub analysis_intervals: Vec<String>,
}

/// Share of buy volume that is net delta, in percent.
pub fn delta_dominance_percent(split: &VolumeSplit) -> Result<f64, SignalError> {
    if split.total_buy_volume == 0.0 {
        return Err(SignalError::DivisionByZero {
            what: "total buy volume",
        });
    }
    Ok(split.cumulative_delta / split.total_buy_volume * 100.0)
}

/// Buy volume per unit of sell volume; unbounded when nothing was sold.
pub fn buy_to_sell_ratio(split: &VolumeSplit) -> f64 {
    if split.total_sell_volume == 0.0 {
        f64::INFINITY
    } else {
        split.total_buy_volume / split.total_sell_volume
    }
}

/// Apply the qualification gate. Returns `None` when any condition fails.
pub fn evaluate(
    split: &VolumeSplit,
    interest: &OpenInterestSnapshot,
    thresholds: &ThresholdConfig,
) -> Option<QualifiedSignal> {
    if split.total_buy_volume <= split.total_sell_volume || split.cumulative_delta <= 0.0 {
        return None;
    }
    if interest.current <= interest.previous {
        return None;
    }

    let growth = match growth_percent(interest.previous, interest.current) {
        Ok(g) => g,
        Err(e) => {
            debug!(error = %e, "open interest growth undefined");
            return None;
        }
    };
    if growth <= thresholds.interest_percentage {
        return None;
    }

    let dominance = match delta_dominance_percent(split) {
        Ok(d) => d,
        Err(e) => {
            debug!(error = %e, "delta dominance undefined");
            return None;
        }
    };
    if dominance <= thresholds.delta_percentage {
        return None;
    }

    Some(QualifiedSignal {
        previous_open_interest: interest.previous,
        current_open_interest: interest.current,
        interest_growth_percent: growth,
        cumulative_delta: split.cumulative_delta,
        total_buy_volume: split.total_buy_volume,
        total_sell_volume: split.total_sell_volume,
        delta_dominance_percent: dominance,
        buy_to_sell_ratio: buy_to_sell_ratio(split),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::volume_split::split;
    use crate::types::Candle;

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            delta_percentage: 5.0,
            interest_percentage: 10.0,
            analysis_intervals: vec!["15m".into()],
        }
    }

    fn baseline_split() -> VolumeSplit {
        VolumeSplit {
            cumulative_delta: 800.0,
            total_buy_volume: 900.0,
            total_sell_volume: 100.0,
        }
    }

    fn baseline_interest() -> OpenInterestSnapshot {
        OpenInterestSnapshot {
            previous: 1000.0,
            current: 1300.0,
        }
    }

    #[test]
    fn qualifying_example_from_candles() {
        let candles = [Candle::new(0, 100.0, 110.0, 90.0, 108.0, 1000.0, 59_999)];
        let s = split(&candles);
        let signal = evaluate(&s, &baseline_interest(), &thresholds()).expect("should qualify");

        assert!((signal.total_buy_volume - 900.0).abs() < 1e-9);
        assert!((signal.total_sell_volume - 100.0).abs() < 1e-9);
        assert!((signal.cumulative_delta - 800.0).abs() < 1e-9);
        assert!((signal.interest_growth_percent - 30.0).abs() < 1e-9);
        assert!((signal.delta_dominance_percent - 88.888_888_9).abs() < 1e-6);
        assert!((signal.buy_to_sell_ratio - 9.0).abs() < 1e-9);
    }

    #[test]
    fn falling_open_interest_does_not_qualify() {
        let candles = [Candle::new(0, 100.0, 110.0, 90.0, 108.0, 1000.0, 59_999)];
        let interest = OpenInterestSnapshot {
            previous: 1300.0,
            current: 1000.0,
        };
        assert!(evaluate(&split(&candles), &interest, &thresholds()).is_none());
    }

    #[test]
    fn baseline_qualifies() {
        assert!(evaluate(&baseline_split(), &baseline_interest(), &thresholds()).is_some());
    }

    #[test]
    fn condition_1_buy_not_above_sell() {
        let s = VolumeSplit {
            total_buy_volume: 100.0,
            total_sell_volume: 100.0,
            ..baseline_split()
        };
        assert!(evaluate(&s, &baseline_interest(), &thresholds()).is_none());
    }

    #[test]
    fn condition_2_non_positive_delta() {
        let s = VolumeSplit {
            cumulative_delta: 0.0,
            ..baseline_split()
        };
        assert!(evaluate(&s, &baseline_interest(), &thresholds()).is_none());
    }

    #[test]
    fn condition_3_open_interest_flat() {
        let interest = OpenInterestSnapshot {
            previous: 1000.0,
            current: 1000.0,
        };
        let mut t = thresholds();
        // Keep condition 4 satisfiable on its own.
        t.interest_percentage = -50.0;
        assert!(evaluate(&baseline_split(), &interest, &t).is_none());
    }

    #[test]
    fn condition_4_growth_below_threshold() {
        let mut t = thresholds();
        t.interest_percentage = 30.5;
        assert!(evaluate(&baseline_split(), &baseline_interest(), &t).is_none());
        t.interest_percentage = 29.9;
        assert!(evaluate(&baseline_split(), &baseline_interest(), &t).is_some());
    }

    #[test]
    fn condition_5_delta_dominance_below_threshold() {
        let mut t = thresholds();
        t.delta_percentage = 90.0;
        assert!(evaluate(&baseline_split(), &baseline_interest(), &t).is_none());
    }

    #[test]
    fn zero_previous_interest_is_non_qualifying() {
        let interest = OpenInterestSnapshot {
            previous: 0.0,
            current: 500.0,
        };
        assert!(evaluate(&baseline_split(), &interest, &thresholds()).is_none());
    }

    #[test]
    fn zero_buy_volume_is_division_by_zero() {
        let s = VolumeSplit {
            cumulative_delta: -10.0,
            total_buy_volume: 0.0,
            total_sell_volume: 10.0,
        };
        assert!(delta_dominance_percent(&s).is_err());
        assert!(evaluate(&s, &baseline_interest(), &thresholds()).is_none());
    }

    #[test]
    fn no_sell_volume_reports_unbounded_ratio() {
        let s = VolumeSplit {
            cumulative_delta: 500.0,
            total_buy_volume: 500.0,
            total_sell_volume: 0.0,
        };
        let signal = evaluate(&s, &baseline_interest(), &thresholds()).expect("should qualify");
        assert!(signal.buy_to_sell_ratio.is_infinite());
    }
}
