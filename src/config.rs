// =============================================================================
// Screener Configuration — loaded once at startup, read-only afterwards
// =============================================================================
//
// Credentials, analysis intervals and the two signal thresholds are required:
// a missing or malformed key aborts startup.  Scan tuning knobs carry
// `#[serde(default = "...")]` so older config files keep loading.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::ThresholdConfig;

/// Kline intervals accepted by the futures API.
const KLINE_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Periods accepted by the open-interest history endpoint.
const OI_HISTORY_PERIODS: &[&str] = &["5m", "15m", "30m", "1h", "2h", "4h", "6h", "12h", "1d"];

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_cycle_delay_secs() -> u64 {
    180
}

fn default_max_concurrent_symbols() -> usize {
    4
}

fn default_max_inflight_requests() -> usize {
    8
}

fn default_candle_limit() -> u32 {
    10
}

fn default_open_interest_period() -> String {
    "5m".to_string()
}

fn default_notification_queue_capacity() -> usize {
    256
}

// =============================================================================
// ScreenerConfig
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    // --- Credentials --------------------------------------------------------
    pub binance_api_key: String,
    pub binance_api_secret: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,

    // --- Signal thresholds --------------------------------------------------

    /// Kline intervals evaluated per symbol, in order (e.g. `["15m", "1h"]`).
    pub analysis_intervals: Vec<String>,

    /// Minimum `delta / buy volume` in percent.
    pub delta_percentage: f64,

    /// Minimum open-interest growth in percent.
    pub interest_percentage: f64,

    // --- Scan tuning --------------------------------------------------------

    /// Idle time between the end of one cycle and the start of the next.
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,

    /// Symbols scanned concurrently within a cycle.
    #[serde(default = "default_max_concurrent_symbols")]
    pub max_concurrent_symbols: usize,

    /// Requests allowed in flight against the exchange at any moment.
    #[serde(default = "default_max_inflight_requests")]
    pub max_inflight_requests: usize,

    /// Candles fetched per symbol/interval.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    /// Period of the open-interest history used as the previous sample.
    #[serde(default = "default_open_interest_period")]
    pub open_interest_period: String,

    /// Pending notifications held before new signals are dropped.
    #[serde(default = "default_notification_queue_capacity")]
    pub notification_queue_capacity: usize,
}

impl ScreenerConfig {
    /// Load and validate configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config = Self::from_json(&content)
            .with_context(|| format!("invalid config in {}", path.display()))?;

        info!(
            path = %path.display(),
            intervals = ?config.analysis_intervals,
            delta_percentage = config.delta_percentage,
            interest_percentage = config.interest_percentage,
            cycle_delay_secs = config.cycle_delay_secs,
            "config loaded"
        );

        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).context("failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every cycle fail or the gate meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.analysis_intervals.is_empty() {
            anyhow::bail!("analysis_intervals must not be empty");
        }
        for interval in &self.analysis_intervals {
            if !KLINE_INTERVALS.contains(&interval.as_str()) {
                anyhow::bail!("unknown kline interval '{interval}'");
            }
        }
        if !OI_HISTORY_PERIODS.contains(&self.open_interest_period.as_str()) {
            anyhow::bail!(
                "unknown open_interest_period '{}'",
                self.open_interest_period
            );
        }
        if !self.delta_percentage.is_finite() || !self.interest_percentage.is_finite() {
            anyhow::bail!("delta_percentage and interest_percentage must be finite");
        }
        if self.max_concurrent_symbols == 0 || self.max_inflight_requests == 0 {
            anyhow::bail!("concurrency limits must be at least 1");
        }
        if self.candle_limit == 0 || self.notification_queue_capacity == 0 {
            anyhow::bail!("candle_limit and notification_queue_capacity must be at least 1");
        }
        Ok(())
    }

    /// The read-only threshold set shared by every scan.
    pub fn thresholds(&self) -> ThresholdConfig {
        ThresholdConfig {
            delta_percentage: self.delta_percentage,
            interest_percentage: self.interest_percentage,
            analysis_intervals: self.analysis_intervals.clone(),
        }
    }
}

impl std::fmt::Debug for ScreenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenerConfig")
            .field("binance_api_key", &"<redacted>")
            .field("binance_api_secret", &"<redacted>")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("analysis_intervals", &self.analysis_intervals)
            .field("delta_percentage", &self.delta_percentage)
            .field("interest_percentage", &self.interest_percentage)
            .field("cycle_delay_secs", &self.cycle_delay_secs)
            .field("max_concurrent_symbols", &self.max_concurrent_symbols)
            .field("max_inflight_requests", &self.max_inflight_requests)
            .field("candle_limit", &self.candle_limit)
            .field("open_interest_period", &self.open_interest_period)
            .finish()
    }
}
