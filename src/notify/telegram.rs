// =============================================================================
// Telegram Notifier — Bot API sendMessage
// =============================================================================
//
// SECURITY: the bot token is part of the request URL, so URLs are never
// logged and the token is redacted from `Debug`.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::Notifier;

const TELEGRAM_API: &str = "https://api.telegram.org";
const CHART_BASE: &str = "https://www.coinglass.com/tv/Binance_";

pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client for TelegramNotifier")?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            client,
        })
    }

    /// Message body plus a chart link for the symbol.
    pub fn compose(symbol: &str, message: &str) -> String {
        format!("{message}\n\nChart: {CHART_BASE}{symbol}")
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, symbol: &str, message: &str) -> Result<()> {
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.token);
        let text = Self::compose(symbol, message);

        // reqwest errors embed the URL, which carries the token.
        let resp = self
            .client
            .get(&url)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("telegram request failed: {}", e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("telegram sendMessage returned {status}");
        }

        debug!(symbol, "telegram message delivered");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}
