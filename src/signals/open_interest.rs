// =============================================================================
// Open Interest Trend — growth between two samples
// =============================================================================
//
// Rising OI means new positions are being opened; combined with buyer-heavy
// volume it marks fresh long participation rather than short covering.

use crate::error::SignalError;

/// Percentage growth from `previous` to `current`.
///
/// Fails with [`SignalError::DivisionByZero`] when `previous` is zero; callers
/// treat that as "undefined" and skip the evaluation.
pub fn growth_percent(previous: f64, current: f64) -> Result<f64, SignalError> {
    if previous == 0.0 {
        return Err(SignalError::DivisionByZero {
            what: "previous open interest",
        });
    }
    Ok((current - previous) / previous * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_percent_growth() {
        assert!((growth_percent(100.0, 150.0).unwrap() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn decline_is_negative() {
        let g = growth_percent(1300.0, 1000.0).unwrap();
        assert!(g < 0.0);
        assert!((g + 23.076923076923077).abs() < 1e-9);
    }

    #[test]
    fn zero_previous_is_division_by_zero() {
        for current in [0.0, 1.0, 12_345.6] {
            assert_eq!(
                growth_percent(0.0, current),
                Err(SignalError::DivisionByZero {
                    what: "previous open interest"
                })
            );
        }
    }
}
