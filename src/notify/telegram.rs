//! Telegram Bot API channel.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use super::{Notifier, NotifyError};
use crate::checker::CheckOutcome;
use crate::config::{ItemSpec, Priority};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramNotifier {
    client: Client,
    chat_id: String,
    api_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            client: Client::new(),
            chat_id: chat_id.to_string(),
            api_url: format!("{TELEGRAM_API_BASE}/bot{bot_token}/sendMessage"),
        }
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });
        let response = self
            .client
            .post(&self.api_url)
            .timeout(SEND_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!("telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send_startup(&self, items: &[ItemSpec], domain: &str) -> Result<(), NotifyError> {
        self.send(&startup_message(items, domain)).await
    }

    async fn send_restock(
        &self,
        item: &ItemSpec,
        outcome: &CheckOutcome,
    ) -> Result<(), NotifyError> {
        self.send(&restock_message(item, outcome)).await
    }

    async fn send_error(
        &self,
        item: &ItemSpec,
        error: &str,
        error_count: u32,
    ) -> Result<(), NotifyError> {
        self.send(&error_message(item, error, error_count)).await
    }
}

pub(crate) fn startup_message(items: &[ItemSpec], domain: &str) -> String {
    let item_list = items
        .iter()
        .map(|item| {
            let marker = if item.priority == Priority::High {
                "🔴"
            } else {
                "⚪"
            };
            format!("  {} {}", marker, item.display_name())
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "🟢 <b>Stock monitor started</b>\n\
         Browser: Chromium (stealth)\n\
         Domain: {domain}\n\n\
         Monitoring:\n{item_list}"
    )
}

pub(crate) fn restock_message(item: &ItemSpec, outcome: &CheckOutcome) -> String {
    let title = outcome.title.as_deref().unwrap_or(item.display_name());
    let price = outcome
        .price
        .as_deref()
        .map(|price| format!("\n💰 {price}"))
        .unwrap_or_default();
    let priority = if item.priority == Priority::High {
        " 🔴 HIGH PRIORITY"
    } else {
        ""
    };
    let now = Utc::now().to_rfc3339();
    format!(
        "🚨🚨🚨 <b>IN STOCK NOW</b>{priority} 🚨🚨🚨\n\n\
         <b>{title}</b>{price}\n\n\
         🔗 <a href=\"{url}\">BUY NOW →</a>\n\n\
         ID: <code>{id}</code>\n\
         ⏰ {now}",
        url = outcome.url,
        id = outcome.id,
    )
}

pub(crate) fn error_message(item: &ItemSpec, error: &str, error_count: u32) -> String {
    format!(
        "⚠️ <b>Monitor issue</b>\n\
         <b>{label}</b> — {error_count} consecutive errors\n\
         Last error: {error}\n\
         ID: <code>{id}</code>\n\
         📸 Debug captures saved",
        label = item.display_name(),
        id = item.id,
    )
}
