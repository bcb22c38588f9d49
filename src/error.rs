// =============================================================================
// Error kinds shared between the exchange boundary and the signal pipeline
// =============================================================================

use thiserror::Error;

/// Failure returned by a market-data source.
///
/// The exchange-specific "unsupported pair" condition is translated into
/// [`MarketDataError::SymbolUnsupported`] at the client boundary so callers can
/// branch on meaning instead of numeric codes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("symbol {symbol} is temporarily unsupported by the exchange")]
    SymbolUnsupported { symbol: String },

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("price unavailable: {0}")]
    PriceUnavailable(String),
}

impl MarketDataError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::SymbolUnsupported { .. })
    }
}

/// Degenerate-input conditions raised by the signal math.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    #[error("division by zero: {what} is zero")]
    DivisionByZero { what: &'static str },
}
