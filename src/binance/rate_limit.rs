// =============================================================================
// Rate-Limit Tracker — admission control for Binance futures REST calls
// =============================================================================
//
// Binance USDⓈ-M futures enforce a request-weight limit of 2400 per minute per
// IP (we hard-cap ourselves at 2000).
//
// Two gates apply to every request:
//   - A semaphore caps the number of requests in flight.
//   - A weight budget per wall-clock minute.  The budget is reserved before
//     sending and corrected from the `X-MBX-USED-WEIGHT-1M` response header.
//     When it is exhausted the caller waits for the next minute window.
// =============================================================================

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::MarketDataError;

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 2000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 1600;

const WINDOW: Duration = Duration::from_secs(60);

/// Request weight of `GET /fapi/v1/klines` for a given `limit`.
pub fn kline_weight(limit: u32) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

/// Weight used inside the current minute window.
#[derive(Debug)]
struct WeightWindow {
    started: Instant,
    used: u32,
}

impl WeightWindow {
    /// Advance to the window containing `now`, clearing the count if it moved.
    fn roll(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < WINDOW {
            return;
        }
        let windows = (elapsed.as_millis() / WINDOW.as_millis()) as u32;
        self.started += WINDOW * windows;
        self.used = 0;
        debug!("rate-limit weight window rolled over");
    }
}

/// Thread-safe admission gate shared by every request of one client.
pub struct RateLimitTracker {
    window: Mutex<WeightWindow>,
    inflight: Semaphore,
    max_inflight: usize,
}

/// Immutable snapshot of the current rate-limit state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub inflight: usize,
    pub max_inflight: usize,
}

impl RateLimitTracker {
    /// Create a tracker allowing `max_inflight` concurrent requests.  Windows
    /// are aligned to wall-clock minutes, as the exchange counts them.
    pub fn new(max_inflight: usize) -> Self {
        let into_minute = Utc::now().timestamp_millis().rem_euclid(WINDOW.as_millis() as i64);
        let now = Instant::now();
        let started = now
            .checked_sub(Duration::from_millis(into_minute as u64))
            .unwrap_or(now);
        Self::with_window_start(max_inflight, started)
    }

    fn with_window_start(max_inflight: usize, started: Instant) -> Self {
        let max_inflight = max_inflight.max(1);
        Self {
            window: Mutex::new(WeightWindow { started, used: 0 }),
            inflight: Semaphore::new(max_inflight),
            max_inflight,
        }
    }

    // -------------------------------------------------------------------------
    // Admission
    // -------------------------------------------------------------------------

    /// Wait until a request of `weight` may be sent.  The returned permit must
    /// be held until the response has been read.
    pub async fn admit(&self, weight: u32) -> Result<SemaphorePermit<'_>, MarketDataError> {
        let permit = self
            .inflight
            .acquire()
            .await
            .map_err(|_| MarketDataError::DataUnavailable("request gate closed".to_string()))?;

        loop {
            let next_window = match self.try_reserve_at(weight, Instant::now()) {
                Ok(()) => return Ok(permit),
                Err(next_window) => next_window,
            };

            warn!(
                used_weight = self.used_weight(),
                requested_weight = weight,
                wait_ms = next_window
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64,
                "request weight budget exhausted — waiting for next window"
            );
            tokio::time::sleep_until(next_window).await;
        }
    }

    /// Reserve `weight` in the window containing `now`.  On refusal, returns
    /// when the next window opens.
    fn try_reserve_at(&self, weight: u32, now: Instant) -> Result<(), Instant> {
        let mut window = self.window.lock();
        window.roll(now);
        if window.used + weight <= WEIGHT_HARD_LIMIT {
            window.used += weight;
            Ok(())
        } else {
            Err(window.started + WINDOW)
        }
    }

    fn used_weight(&self) -> u32 {
        self.window.lock().used
    }

    // -------------------------------------------------------------------------
    // Header-based updates
    // -------------------------------------------------------------------------

    /// Raise the local weight estimate to the exchange's own count.  The local
    /// count is never lowered: it may include reservations whose responses
    /// have not arrived yet.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };

        let (prev, used) = {
            let mut window = self.window.lock();
            window.roll(Instant::now());
            let prev = window.used;
            window.used = prev.max(w);
            (prev, window.used)
        };

        if used >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = used,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(header_weight = w, used_weight_1m = used, "rate-limit weight updated from header");
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight(),
            inflight: self.max_inflight - self.inflight.available_permits(),
            max_inflight: self.max_inflight,
        }
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight())
            .field("available_permits", &self.inflight.available_permits())
            .field("max_inflight", &self.max_inflight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn weight_header(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn kline_weight_tiers() {
        assert_eq!(kline_weight(10), 1);
        assert_eq!(kline_weight(100), 2);
        assert_eq!(kline_weight(500), 5);
        assert_eq!(kline_weight(1500), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn header_raises_local_estimate() {
        let tracker = RateLimitTracker::with_window_start(2, Instant::now());
        tracker.update_from_headers(&weight_header("1999"));

        let now = Instant::now();
        assert_eq!(tracker.snapshot().used_weight_1m, 1999);
        assert!(tracker.try_reserve_at(2, now).is_err());
        assert!(tracker.try_reserve_at(1, now).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn header_never_lowers_inflight_reservations() {
        let tracker = RateLimitTracker::with_window_start(2, Instant::now());
        assert!(tracker.try_reserve_at(500, Instant::now()).is_ok());

        tracker.update_from_headers(&weight_header("100"));
        assert_eq!(tracker.snapshot().used_weight_1m, 500);

        tracker.update_from_headers(&weight_header("900"));
        assert_eq!(tracker.snapshot().used_weight_1m, 900);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_header_is_ignored() {
        let tracker = RateLimitTracker::with_window_start(2, Instant::now());
        tracker.update_from_headers(&weight_header("lots"));
        assert_eq!(tracker.snapshot().used_weight_1m, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_stops_at_hard_limit() {
        let start = Instant::now();
        let tracker = RateLimitTracker::with_window_start(1, start);
        assert!(tracker.try_reserve_at(WEIGHT_HARD_LIMIT - 1, start).is_ok());
        assert!(tracker.try_reserve_at(1, start).is_ok());
        assert_eq!(tracker.try_reserve_at(1, start), Err(start + WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn new_minute_resets_weight() {
        let start = Instant::now();
        let tracker = RateLimitTracker::with_window_start(1, start);
        assert!(tracker.try_reserve_at(500, start).is_ok());
        assert!(tracker.try_reserve_at(0, start + WINDOW / 2).is_ok());
        assert_eq!(tracker.snapshot().used_weight_1m, 500);

        // Several idle minutes collapse into one roll.
        assert!(tracker.try_reserve_at(1, start + WINDOW * 3 + Duration::from_secs(5)).is_ok());
        assert_eq!(tracker.snapshot().used_weight_1m, 1);
        assert_eq!(
            tracker.try_reserve_at(WEIGHT_HARD_LIMIT, start + WINDOW * 3),
            Err(start + WINDOW * 4)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_waits_for_next_window() {
        let start = Instant::now();
        let tracker = RateLimitTracker::with_window_start(2, start);
        drop(tracker.admit(WEIGHT_HARD_LIMIT).await.unwrap());
        assert_eq!(Instant::now(), start);

        let blocked =
            tokio::time::timeout(Duration::from_secs(30), tracker.admit(1)).await;
        assert!(blocked.is_err(), "request over budget must wait");

        let _permit = tracker.admit(1).await.unwrap();
        assert!(Instant::now() >= start + WINDOW);
        assert!(Instant::now() < start + WINDOW + Duration::from_secs(1));
        assert_eq!(tracker.snapshot().used_weight_1m, 1);
    }

    #[tokio::test]
    async fn permits_cap_inflight_requests() {
        let tracker = RateLimitTracker::new(2);
        let a = tracker.admit(1).await.unwrap();
        let _b = tracker.admit(1).await.unwrap();
        assert_eq!(tracker.snapshot().inflight, 2);

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), tracker.admit(1)).await;
        assert!(blocked.is_err(), "third request must wait for a permit");

        drop(a);
        assert!(tracker.admit(1).await.is_ok());
    }
}
