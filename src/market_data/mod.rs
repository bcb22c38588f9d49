// =============================================================================
// Market Data Source — the screener's view of the exchange
// =============================================================================
//
// The scanner only depends on this trait; the Binance client is one
// implementation and tests plug in in-memory ones.

use async_trait::async_trait;

use crate::error::MarketDataError;
use crate::types::{Candle, OpenInterestSnapshot};

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Every tradable USDT-quoted perpetual symbol, freshly fetched.
    async fn list_usdt_symbols(&self) -> Result<Vec<String>, MarketDataError>;

    /// Last traded price. Fails with [`MarketDataError::PriceUnavailable`].
    async fn current_price(&self, symbol: &str) -> Result<f64, MarketDataError>;

    /// Live open interest plus the previous historical sample.
    async fn open_interest(&self, symbol: &str) -> Result<OpenInterestSnapshot, MarketDataError>;

    /// The most recent `limit` candles for `symbol` at `interval`, oldest first.
    async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError>;
}
