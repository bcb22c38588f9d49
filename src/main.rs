// =============================================================================
// OI Flow Screener — Main Entry Point
// =============================================================================
//
// Scans every USDT perpetual on Binance futures for rising open interest
// backed by buyer-dominated volume delta and pushes a Telegram alert for each
// qualifying symbol/interval.  Runs until Ctrl+C or SIGTERM.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod config;
mod error;
mod market_data;
mod notify;
mod scanner;
mod signals;
mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::{BinanceClient, RateLimitTracker};
use crate::config::ScreenerConfig;
use crate::notify::TelegramNotifier;
use crate::scanner::{MarketScanLoop, SymbolScanner};

/// Upper bound on how long pending notifications may delay exit.
const NOTIFY_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("OI Flow Screener — starting up");

    let config_path =
        std::env::var("SCREENER_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = ScreenerConfig::load(&config_path).context("configuration is required")?;
    let thresholds = Arc::new(config.thresholds());

    // ── 2. Collaborators ─────────────────────────────────────────────────
    let limiter = Arc::new(RateLimitTracker::new(config.max_inflight_requests));
    let binance = Arc::new(BinanceClient::new(
        &config.binance_api_key,
        limiter.clone(),
        config.open_interest_period.clone(),
    )?);

    let telegram = Arc::new(TelegramNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    )?);
    let (sink, dispatcher) = notify::spawn_dispatcher(telegram, config.notification_queue_capacity);

    // ── 3. Scan loop ─────────────────────────────────────────────────────
    let scanner = Arc::new(SymbolScanner::new(
        binance.clone(),
        thresholds,
        config.candle_limit,
        sink,
    ));
    let scan_loop = MarketScanLoop::new(
        binance.clone(),
        scanner,
        Duration::from_secs(config.cycle_delay_secs),
        config.max_concurrent_symbols,
    )
    .with_rate_limit(limiter.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scan_handle = tokio::spawn(async move { scan_loop.run(shutdown_rx).await });

    info!(
        intervals = ?config.analysis_intervals,
        max_concurrent_symbols = config.max_concurrent_symbols,
        max_inflight_requests = config.max_inflight_requests,
        "screener running. Press Ctrl+C to stop."
    );

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    let signal = shutdown_signal()?.await;
    warn!(signal, "Shutdown signal received — stopping gracefully");

    let _ = shutdown_tx.send(true);
    if let Err(e) = scan_handle.await {
        error!(error = %e, "scan loop task failed");
    }

    // The scan loop owned the last `SignalSink`; the dispatcher now drains.
    match tokio::time::timeout(NOTIFY_DRAIN_TIMEOUT, dispatcher).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "notification dispatcher failed"),
        Err(_) => warn!("pending notifications abandoned after drain timeout"),
    }

    info!(rate_limit = ?limiter.snapshot(), "OI Flow Screener shut down complete.");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM (container stop).  The SIGTERM
/// handler is installed before this returns.
fn shutdown_signal() -> anyhow::Result<impl Future<Output = &'static str>> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

    Ok(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => "ctrl_c",
                    Err(e) => {
                        error!(error = %e, "Ctrl+C handler unavailable — waiting for SIGTERM");
                        terminate.recv().await;
                        "sigterm"
                    }
                },
                _ = terminate.recv() => "sigterm",
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            "ctrl_c"
        }
    })
}
