// =============================================================================
// Notifications — fire-and-forget delivery of signal reports
// =============================================================================
//
// The scanner pushes reports into a bounded queue through `SignalSink`; a
// single dispatcher task drains the queue and calls the `Notifier`.  Delivery
// failures are logged and dropped, and a full queue drops the new report, so
// notification trouble can never stall a scan.
// =============================================================================

pub mod telegram;

pub use telegram::TelegramNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::types::SignalReport;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, symbol: &str, message: &str) -> anyhow::Result<()>;
}

/// Non-blocking handle used by scanners to hand off reports.
#[derive(Clone, Debug)]
pub struct SignalSink {
    tx: Sender<SignalReport>,
}

impl SignalSink {
    pub fn new(tx: Sender<SignalReport>) -> Self {
        Self { tx }
    }

    /// Queue `report` for delivery. Never waits.
    pub fn emit(&self, report: SignalReport) {
        match self.tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) => {
                warn!(
                    symbol = %report.symbol,
                    interval = %report.interval,
                    "notification queue full — dropping signal"
                );
            }
            Err(TrySendError::Closed(report)) => {
                warn!(
                    symbol = %report.symbol,
                    interval = %report.interval,
                    "notification dispatcher stopped — dropping signal"
                );
            }
        }
    }
}

/// Drains the report queue into a `Notifier`.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    rx: Receiver<SignalReport>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, rx: Receiver<SignalReport>) -> Self {
        Self { notifier, rx }
    }

    /// Deliver reports until every `SignalSink` has been dropped and the queue
    /// is empty.
    pub async fn run(mut self) {
        while let Some(report) = self.rx.recv().await {
            let message = report.to_string();
            match self.notifier.notify(&report.symbol, &message).await {
                Ok(()) => info!(
                    symbol = %report.symbol,
                    interval = %report.interval,
                    "signal notification sent"
                ),
                Err(e) => error!(
                    symbol = %report.symbol,
                    interval = %report.interval,
                    error = %format!("{e:#}"),
                    "failed to send signal notification"
                ),
            }
        }
        info!("notification dispatcher drained");
    }
}

/// Spawn a dispatcher task with a queue of `capacity` reports.
pub fn spawn_dispatcher(
    notifier: Arc<dyn Notifier>,
    capacity: usize,
) -> (SignalSink, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(NotificationDispatcher::new(notifier, rx).run());
    (SignalSink::new(tx), handle)
}
