// =============================================================================
// Symbol Scanner — one symbol, every configured interval
// =============================================================================
//
// All market data for the symbol is fetched before anything is evaluated, so a
// failure on any request skips the whole symbol for this cycle.  The current
// price is only requested once a signal qualifies.
// =============================================================================

use std::sync::Arc;

use futures_util::future::{try_join, try_join_all};
use tracing::{debug, info, instrument, warn};

use crate::error::MarketDataError;
use crate::market_data::MarketDataSource;
use crate::notify::SignalSink;
use crate::signals::{evaluate, split, ThresholdConfig};
use crate::types::{Candle, OpenInterestSnapshot, SignalReport};

/// What happened to one symbol during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOutcome {
    Scanned { signals: usize },
    Unsupported,
    Failed,
}

pub struct SymbolScanner {
    market: Arc<dyn MarketDataSource>,
    thresholds: Arc<ThresholdConfig>,
    candle_limit: u32,
    sink: SignalSink,
}

impl SymbolScanner {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        thresholds: Arc<ThresholdConfig>,
        candle_limit: u32,
        sink: SignalSink,
    ) -> Self {
        Self {
            market,
            thresholds,
            candle_limit,
            sink,
        }
    }

    #[instrument(skip(self), name = "scan_symbol")]
    pub async fn scan_symbol(&self, symbol: &str) -> SymbolOutcome {
        let (interest, candles_by_interval) = match self.fetch(symbol).await {
            Ok(data) => data,
            Err(e) if e.is_unsupported() => {
                info!(error = %e, "skipping unsupported symbol");
                return SymbolOutcome::Unsupported;
            }
            Err(e) => {
                warn!(error = %e, "market data fetch failed — skipping symbol");
                return SymbolOutcome::Failed;
            }
        };

        let mut price: Option<Option<f64>> = None;
        let mut signals = 0;

        for (interval, candles) in self
            .thresholds
            .analysis_intervals
            .iter()
            .zip(candles_by_interval)
        {
            let volume = split(&candles);
            let Some(signal) = evaluate(&volume, &interest, &self.thresholds) else {
                debug!(
                    interval = %interval,
                    delta = volume.cumulative_delta,
                    previous_oi = interest.previous,
                    current_oi = interest.current,
                    "no signal"
                );
                continue;
            };

            let current_price = match price {
                Some(p) => p,
                None => {
                    let p = self.fetch_price(symbol).await;
                    price = Some(p);
                    p
                }
            };

            let report = SignalReport::new(symbol, interval.as_str(), signal, current_price);
            info!(
                interval = %interval,
                oi_growth_pct = report.interest_growth_percent,
                delta = report.cumulative_delta,
                dominance_pct = report.delta_dominance_percent,
                buy_to_sell = report.buy_to_sell_ratio,
                "buy signal detected"
            );
            self.sink.emit(report);
            signals += 1;
        }

        SymbolOutcome::Scanned { signals }
    }

    /// Open interest plus candles for every interval, in configured order.
    async fn fetch(
        &self,
        symbol: &str,
    ) -> Result<(OpenInterestSnapshot, Vec<Vec<Candle>>), MarketDataError> {
        let candles = try_join_all(
            self.thresholds
                .analysis_intervals
                .iter()
                .map(|interval| self.market.candles(symbol, interval, self.candle_limit)),
        );
        try_join(self.market.open_interest(symbol), candles).await
    }

    async fn fetch_price(&self, symbol: &str) -> Option<f64> {
        match self.market.current_price(symbol).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "price unavailable — reporting signal without it");
                None
            }
        }
    }
}
