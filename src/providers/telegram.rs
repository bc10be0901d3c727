use crate::core::config::TelegramConfig;
use crate::core::notify::Notifier;
use crate::providers::util::http_client;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Delivers messages through the Telegram bot API.
pub struct TelegramNotifier {
    base_url: String,
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(base_url: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        Ok(TelegramNotifier {
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
        };

        // The url carries the bot token, keep it out of error messages
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("Telegram request failed: {}", e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram error: {}: {}", status, body));
        }

        info!("Telegram notification sent");
        Ok(())
    }
}

/// Stand-in used when no bot credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        warn!("Telegram credentials not set, printing notification instead");
        println!("{message}");
        Ok(())
    }
}

pub fn notifier_from_config(
    config: &TelegramConfig,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>> {
    match config.credentials() {
        Some((token, chat_id)) => Ok(Arc::new(TelegramNotifier::new(
            &config.base_url,
            &token,
            &chat_id,
            timeout,
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
