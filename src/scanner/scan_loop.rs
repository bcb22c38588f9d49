// =============================================================================
// Market Scan Loop — Scanning / Idle cycle over the full symbol universe
// =============================================================================
//
//   Scanning: fetch the USDT perpetual universe, scan every symbol with at most
//             `max_concurrent_symbols` in flight, log a cycle summary.
//   Idle:     wait `cycle_delay`, then start over with a fresh universe.
//
// There is no terminal state; the loop stops only when the shutdown channel
// fires, which interrupts either phase immediately.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::symbol_scanner::{SymbolOutcome, SymbolScanner};
use crate::binance::rate_limit::RateLimitSnapshot;
use crate::binance::RateLimitTracker;
use crate::market_data::MarketDataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Scanning,
    Idle,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "Scanning"),
            Self::Idle => write!(f, "Idle"),
        }
    }
}

/// Per-cycle tally, logged once the universe is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub symbols: usize,
    pub scanned: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub signals: usize,
    /// Admission state at the end of the cycle, when a tracker is attached.
    pub rate_limit: Option<RateLimitSnapshot>,
}

impl CycleStats {
    fn record(&mut self, outcome: SymbolOutcome) {
        match outcome {
            SymbolOutcome::Scanned { signals } => {
                self.scanned += 1;
                self.signals += signals;
            }
            SymbolOutcome::Unsupported => self.unsupported += 1,
            SymbolOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct MarketScanLoop {
    universe: Arc<dyn MarketDataSource>,
    scanner: Arc<SymbolScanner>,
    cycle_delay: Duration,
    max_concurrent_symbols: usize,
    rate_limit: Option<Arc<RateLimitTracker>>,
}

impl MarketScanLoop {
    pub fn new(
        universe: Arc<dyn MarketDataSource>,
        scanner: Arc<SymbolScanner>,
        cycle_delay: Duration,
        max_concurrent_symbols: usize,
    ) -> Self {
        Self {
            universe,
            scanner,
            cycle_delay,
            max_concurrent_symbols: max_concurrent_symbols.max(1),
            rate_limit: None,
        }
    }

    /// Include the tracker's snapshot in every cycle summary.
    pub fn with_rate_limit(mut self, tracker: Arc<RateLimitTracker>) -> Self {
        self.rate_limit = Some(tracker);
        self
    }

    /// Run cycles until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut cycle: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            cycle += 1;
            let span = info_span!("scan_cycle", cycle, cycle_id = %Uuid::new_v4());
            info!(parent: &span, phase = %ScanPhase::Scanning, "cycle started");

            tokio::select! {
                _ = self.run_cycle().instrument(span.clone()) => {}
                _ = shutdown.changed() => {
                    info!(parent: &span, "shutdown requested mid-cycle");
                    break;
                }
            }

            info!(
                parent: &span,
                phase = %ScanPhase::Idle,
                delay_secs = self.cycle_delay.as_secs(),
                "waiting before next cycle"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.cycle_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(cycles = cycle, "scan loop stopped");
    }

    /// Scan the freshly fetched universe once.  Returns `None` when the
    /// universe itself could not be listed.
    pub async fn run_cycle(&self) -> Option<CycleStats> {
        let started = Instant::now();

        let symbols = match self.universe.list_usdt_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                error!(error = %e, "failed to list symbol universe — skipping cycle");
                return None;
            }
        };

        let mut stats = CycleStats {
            symbols: symbols.len(),
            ..Default::default()
        };

        let scanner = &self.scanner;
        let outcomes: Vec<SymbolOutcome> = stream::iter(symbols)
            .map(|symbol| async move { scanner.scan_symbol(&symbol).await })
            .buffer_unordered(self.max_concurrent_symbols)
            .collect()
            .await;

        for outcome in outcomes {
            stats.record(outcome);
        }
        stats.rate_limit = self.rate_limit.as_ref().map(|t| t.snapshot());

        info!(
            symbols = stats.symbols,
            scanned = stats.scanned,
            unsupported = stats.unsupported,
            failed = stats.failed,
            signals = stats.signals,
            rate_limit = ?stats.rate_limit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );

        Some(stats)
    }
}
