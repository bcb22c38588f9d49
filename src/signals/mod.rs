// =============================================================================
// Signals Module
// =============================================================================
//
// Decision logic of the screener:
// - Buy/sell volume split estimated from OHLCV candles
// - Open interest growth between two samples
// - Conjunctive qualification gate

pub mod evaluator;
pub mod open_interest;
pub mod volume_split;

pub use evaluator::{evaluate, ThresholdConfig};
pub use volume_split::split;
