//! Discord webhook channel. Messages go out as embeds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{Notifier, NotifyError};
use crate::checker::CheckOutcome;
use crate::config::{ItemSpec, Priority};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

const COLOR_GREEN: u32 = 0x2ECC71;
const COLOR_RED: u32 = 0xE74C3C;
const COLOR_YELLOW: u32 = 0xF1C40F;

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    async fn send(&self, embed: serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(SEND_TIMEOUT)
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!("discord message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send_startup(&self, items: &[ItemSpec], domain: &str) -> Result<(), NotifyError> {
        self.send(startup_embed(items, domain)).await
    }

    async fn send_restock(
        &self,
        item: &ItemSpec,
        outcome: &CheckOutcome,
    ) -> Result<(), NotifyError> {
        self.send(restock_embed(item, outcome)).await
    }

    async fn send_error(
        &self,
        item: &ItemSpec,
        error: &str,
        error_count: u32,
    ) -> Result<(), NotifyError> {
        self.send(error_embed(item, error, error_count)).await
    }
}

pub(crate) fn startup_embed(items: &[ItemSpec], domain: &str) -> serde_json::Value {
    let item_list = items
        .iter()
        .map(|item| {
            format!(
                "{} {}",
                if item.priority == Priority::High { "🔴" } else { "⚪" },
                item.display_name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    json!({
        "title": "Stock monitor started",
        "description": format!("Domain: {domain}\n\n{item_list}"),
        "color": COLOR_GREEN,
    })
}

pub(crate) fn restock_embed(item: &ItemSpec, outcome: &CheckOutcome) -> serde_json::Value {
    let title = outcome.title.as_deref().unwrap_or(item.display_name());
    let mut fields = vec![json!({ "name": "ID", "value": outcome.id, "inline": true })];
    if let Some(price) = &outcome.price {
        fields.push(json!({ "name": "Price", "value": price, "inline": true }));
    }
    if item.priority == Priority::High {
        fields.push(json!({ "name": "Priority", "value": "HIGH", "inline": true }));
    }
    json!({
        "title": format!("🚨 IN STOCK NOW — {title}"),
        "url": outcome.url,
        "description": "Buy it before it's gone.",
        "color": COLOR_RED,
        "fields": fields,
    })
}

pub(crate) fn error_embed(item: &ItemSpec, error: &str, error_count: u32) -> serde_json::Value {
    json!({
        "title": "Monitor issue",
        "description": format!(
            "**{}** — {} consecutive errors\nLast error: {}",
            item.display_name(), error_count, error
        ),
        "color": COLOR_YELLOW,
        "fields": [{ "name": "ID", "value": item.id, "inline": true }],
    })
}
