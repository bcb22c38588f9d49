// =============================================================================
// Binance USDⓈ-M Futures REST Client — public market data
// =============================================================================
//
// Only public endpoints are used, so requests are not signed.  The API key is
// still sent as `X-MBX-APIKEY` and is never logged.  Every request passes the
// shared `RateLimitTracker` before it is sent.
//
// Error code -4108 ("symbol is on delivery or settlement / unsupported pair")
// is translated into `MarketDataError::SymbolUnsupported` here so that the
// scanner never has to know about numeric exchange codes.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use super::rate_limit::{kline_weight, RateLimitTracker};
use crate::error::MarketDataError;
use crate::market_data::MarketDataSource;
use crate::types::{Candle, OpenInterestSnapshot};

const BASE_URL: &str = "https://fapi.binance.com";

/// Binance error code for a pair that cannot currently be queried.
const UNSUPPORTED_SYMBOL_CODE: i64 = -4108;

const EXCHANGE_INFO_WEIGHT: u32 = 1;
const TICKER_PRICE_WEIGHT: u32 = 1;
const OPEN_INTEREST_WEIGHT: u32 = 1;
const OPEN_INTEREST_HIST_WEIGHT: u32 = 1;

/// Binance futures REST client for the screener's market-data needs.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    limiter: Arc<RateLimitTracker>,
    open_interest_period: String,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `api_key`              — sent as a header, never in query params.
    /// * `limiter`              — admission gate shared by all requests.
    /// * `open_interest_period` — history period used for the previous OI sample.
    pub fn new(
        api_key: &str,
        limiter: Arc<RateLimitTracker>,
        open_interest_period: impl Into<String>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        if !api_key.is_empty() {
            let val = HeaderValue::from_str(api_key).context("API key is not a valid header value")?;
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = BASE_URL, "BinanceClient initialised");

        Ok(Self {
            base_url: BASE_URL.to_string(),
            client,
            limiter,
            open_interest_period: open_interest_period.into(),
        })
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// Admitted GET returning the decoded JSON body.  `symbol` enables the
    /// unsupported-pair mapping for per-symbol endpoints.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        weight: u32,
        symbol: Option<&str>,
    ) -> Result<serde_json::Value, MarketDataError> {
        let _permit = self.limiter.admit(weight).await?;

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketDataError::DataUnavailable(format!("GET {path} request failed: {e}")))?;

        self.limiter.update_from_headers(resp.headers());

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| MarketDataError::DataUnavailable(format!("GET {path} body read failed: {e}")))?;

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(body) if status.is_success() => Ok(body),
            Ok(body) => Err(classify_error(path, symbol, status, &body)),
            Err(e) if status.is_success() => Err(MarketDataError::DataUnavailable(format!(
                "failed to parse {path} response: {e}"
            ))),
            Err(_) => Err(MarketDataError::DataUnavailable(format!(
                "Binance GET {path} returned {status}: {text}"
            ))),
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    /// GET /fapi/v1/exchangeInfo, filtered to tradable USDT perpetuals.
    #[instrument(skip(self), name = "binance::list_usdt_symbols")]
    async fn list_usdt_symbols(&self) -> Result<Vec<String>, MarketDataError> {
        let body = self
            .get_json("/fapi/v1/exchangeInfo", &[], EXCHANGE_INFO_WEIGHT, None)
            .await?;
        let symbols = parse_usdt_perpetuals(&body).map_err(unavailable)?;
        debug!(count = symbols.len(), "USDT perpetual universe fetched");
        Ok(symbols)
    }

    /// GET /fapi/v1/ticker/price.
    #[instrument(skip(self), name = "binance::current_price")]
    async fn current_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let body = self
            .get_json(
                "/fapi/v1/ticker/price",
                &[("symbol", symbol)],
                TICKER_PRICE_WEIGHT,
                Some(symbol),
            )
            .await
            .map_err(|e| MarketDataError::PriceUnavailable(format!("{symbol}: {e}")))?;

        parse_str_f64(&body["price"])
            .map_err(|e| MarketDataError::PriceUnavailable(format!("{symbol}: {e:#}")))
    }

    /// GET /fapi/v1/openInterest + GET /futures/data/openInterestHist (limit 2).
    #[instrument(skip(self), name = "binance::open_interest")]
    async fn open_interest(&self, symbol: &str) -> Result<OpenInterestSnapshot, MarketDataError> {
        let live_query = [("symbol", symbol)];
        let history_query = [
            ("symbol", symbol),
            ("period", self.open_interest_period.as_str()),
            ("limit", "2"),
        ];

        let live = self.get_json(
            "/fapi/v1/openInterest",
            &live_query,
            OPEN_INTEREST_WEIGHT,
            Some(symbol),
        );
        let history = self.get_json(
            "/futures/data/openInterestHist",
            &history_query,
            OPEN_INTEREST_HIST_WEIGHT,
            Some(symbol),
        );
        let (live, history) = futures_util::future::try_join(live, history).await?;

        let snapshot = parse_open_interest(&live, &history).map_err(unavailable)?;
        debug!(
            symbol,
            previous = snapshot.previous,
            current = snapshot.current,
            "open interest fetched"
        );
        Ok(snapshot)
    }

    /// GET /fapi/v1/klines.
    #[instrument(skip(self), name = "binance::candles")]
    async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let limit_str = limit.to_string();
        let body = self
            .get_json(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol),
                    ("interval", interval),
                    ("limit", limit_str.as_str()),
                ],
                kline_weight(limit),
                Some(symbol),
            )
            .await?;

        let candles = parse_klines(&body).map_err(unavailable)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("open_interest_period", &self.open_interest_period)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response handling
// -----------------------------------------------------------------------------

fn unavailable(e: anyhow::Error) -> MarketDataError {
    MarketDataError::DataUnavailable(format!("{e:#}"))
}

/// Map a non-2xx Binance error body onto a semantic error kind.
fn classify_error(
    path: &str,
    symbol: Option<&str>,
    status: StatusCode,
    body: &serde_json::Value,
) -> MarketDataError {
    match (symbol, body["code"].as_i64()) {
        (Some(symbol), Some(UNSUPPORTED_SYMBOL_CODE)) => MarketDataError::SymbolUnsupported {
            symbol: symbol.to_string(),
        },
        _ => MarketDataError::DataUnavailable(format!(
            "Binance GET {path} returned {status}: {body}"
        )),
    }
}

/// Extract tradable USDT-quoted perpetual symbols from an exchangeInfo body.
fn parse_usdt_perpetuals(body: &serde_json::Value) -> Result<Vec<String>> {
    let entries = body["symbols"]
        .as_array()
        .context("exchangeInfo response missing 'symbols' array")?;

    let symbols = entries
        .iter()
        .filter(|s| s["quoteAsset"].as_str() == Some("USDT"))
        .filter(|s| s["contractType"].as_str() == Some("PERPETUAL"))
        .filter(|s| s["status"].as_str() == Some("TRADING"))
        .filter_map(|s| s["symbol"].as_str().map(str::to_string))
        .collect();

    Ok(symbols)
}

/// Combine the live OI body with the history body.  The previous sample is the
/// older of the last two history entries.
fn parse_open_interest(
    live: &serde_json::Value,
    history: &serde_json::Value,
) -> Result<OpenInterestSnapshot> {
    let current = parse_str_f64(&live["openInterest"]).context("live openInterest")?;

    let samples = history
        .as_array()
        .context("openInterestHist response is not an array")?;
    if samples.len() < 2 {
        anyhow::bail!(
            "openInterestHist returned {} samples, need at least 2",
            samples.len()
        );
    }
    let previous = parse_str_f64(&samples[samples.len() - 2]["sumOpenInterest"])
        .context("historical sumOpenInterest")?;

    Ok(OpenInterestSnapshot { previous, current })
}

/// Parse Binance's array-of-arrays kline format.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, ...
fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().unwrap_or(0);
        let open = parse_str_f64(&arr[1])?;
        let high = parse_str_f64(&arr[2])?;
        let low = parse_str_f64(&arr[3])?;
        let close = parse_str_f64(&arr[4])?;
        let volume = parse_str_f64(&arr[5])?;
        let close_time = arr[6].as_i64().unwrap_or(0);

        candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
    }

    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsupported_code_maps_to_symbol_unsupported() {
        let body = json!({ "code": -4108, "msg": "Symbol is on delivering or delivered or settling or closed or pre-trading." });
        let err = classify_error("/fapi/v1/klines", Some("XYZUSDT"), StatusCode::BAD_REQUEST, &body);
        assert_eq!(
            err,
            MarketDataError::SymbolUnsupported {
                symbol: "XYZUSDT".into()
            }
        );
    }

    #[test]
    fn other_codes_are_data_unavailable() {
        let body = json!({ "code": -1121, "msg": "Invalid symbol." });
        let err = classify_error("/fapi/v1/klines", Some("XYZUSDT"), StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, MarketDataError::DataUnavailable(ref m) if m.contains("-1121")));

        // Universe listing has no symbol to skip.
        let body = json!({ "code": -4108 });
        let err = classify_error("/fapi/v1/exchangeInfo", None, StatusCode::BAD_REQUEST, &body);
        assert!(!err.is_unsupported());
    }

    #[test]
    fn universe_keeps_trading_usdt_perpetuals_only() {
        let body = json!({
            "symbols": [
                { "symbol": "BTCUSDT", "quoteAsset": "USDT", "contractType": "PERPETUAL", "status": "TRADING" },
                { "symbol": "ETHBUSD", "quoteAsset": "BUSD", "contractType": "PERPETUAL", "status": "TRADING" },
                { "symbol": "BTCUSDT_250926", "quoteAsset": "USDT", "contractType": "CURRENT_QUARTER", "status": "TRADING" },
                { "symbol": "OLDUSDT", "quoteAsset": "USDT", "contractType": "PERPETUAL", "status": "SETTLING" },
                { "symbol": "SOLUSDT", "quoteAsset": "USDT", "contractType": "PERPETUAL", "status": "TRADING" }
            ]
        });
        assert_eq!(parse_usdt_perpetuals(&body).unwrap(), vec!["BTCUSDT", "SOLUSDT"]);
        assert!(parse_usdt_perpetuals(&json!({})).is_err());
    }

    #[test]
    fn open_interest_uses_older_history_sample() {
        let live = json!({ "symbol": "BTCUSDT", "openInterest": "1300.5", "time": 1700000000000i64 });
        let history = json!([
            { "symbol": "BTCUSDT", "sumOpenInterest": "1000.0", "timestamp": 1699999700000i64 },
            { "symbol": "BTCUSDT", "sumOpenInterest": "1200.0", "timestamp": 1700000000000i64 }
        ]);
        let snap = parse_open_interest(&live, &history).unwrap();
        assert!((snap.previous - 1000.0).abs() < f64::EPSILON);
        assert!((snap.current - 1300.5).abs() < f64::EPSILON);
    }

    #[test]
    fn open_interest_needs_two_history_samples() {
        let live = json!({ "openInterest": "10" });
        let history = json!([{ "sumOpenInterest": "9" }]);
        assert!(parse_open_interest(&live, &history).is_err());
    }

    #[test]
    fn klines_parse_and_skip_short_rows() {
        let body = json!([
            [1700000000000i64, "100.0", "110.0", "90.0", "108.0", "1000.0", 1700000899999i64, "0", 10, "0", "0", "0"],
            [1700000900000i64, "108.0"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(
            candles[0],
            Candle::new(1700000000000, 100.0, 110.0, 90.0, 108.0, 1000.0, 1700000899999)
        );
    }

    #[test]
    fn parse_str_f64_accepts_numbers_and_strings() {
        assert!((parse_str_f64(&json!("1.5")).unwrap() - 1.5).abs() < f64::EPSILON);
        assert!((parse_str_f64(&json!(2.5)).unwrap() - 2.5).abs() < f64::EPSILON);
        assert!(parse_str_f64(&json!(null)).is_err());
    }
}
