//! Push notifications.
//!
//! Each channel implements [`Notifier`]; the fan-out helpers call every
//! configured channel and isolate failures so one dead webhook never costs
//! an alert on the others.

pub mod discord;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, warn};

use crate::checker::CheckOutcome;
use crate::config::{Config, ItemSpec};

pub use discord::DiscordNotifier;
pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api rejected the message: {status} {body}")]
    Api { status: u16, body: String },
}

/// One push channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_startup(&self, items: &[ItemSpec], domain: &str) -> Result<(), NotifyError>;

    async fn send_restock(&self, item: &ItemSpec, outcome: &CheckOutcome)
        -> Result<(), NotifyError>;

    async fn send_error(
        &self,
        item: &ItemSpec,
        error: &str,
        error_count: u32,
    ) -> Result<(), NotifyError>;
}

/// Instantiates every channel the config has credentials for.
pub fn build_notifiers(config: &Config) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if !config.telegram_bot_token.is_empty() && !config.telegram_chat_id.is_empty() {
        notifiers.push(Box::new(TelegramNotifier::new(
            &config.telegram_bot_token,
            &config.telegram_chat_id,
        )));
    }

    if !config.discord_webhook_url.is_empty() {
        notifiers.push(Box::new(DiscordNotifier::new(&config.discord_webhook_url)));
    }

    if notifiers.is_empty() {
        error!("no notifiers configured, alerts will not be sent");
    }
    notifiers
}

pub async fn notify_startup(notifiers: &[Box<dyn Notifier>], items: &[ItemSpec], domain: &str) {
    for notifier in notifiers {
        if let Err(err) = notifier.send_startup(items, domain).await {
            warn!(channel = notifier.name(), error = %err, "startup notification failed");
        }
    }
}

pub async fn notify_restock(
    notifiers: &[Box<dyn Notifier>],
    item: &ItemSpec,
    outcome: &CheckOutcome,
) {
    for notifier in notifiers {
        if let Err(err) = notifier.send_restock(item, outcome).await {
            warn!(channel = notifier.name(), error = %err, "restock notification failed");
        }
    }
}

pub async fn notify_error(
    notifiers: &[Box<dyn Notifier>],
    item: &ItemSpec,
    error: &str,
    error_count: u32,
) {
    for notifier in notifiers {
        if let Err(err) = notifier.send_error(item, error, error_count).await {
            warn!(channel = notifier.name(), error = %err, "error notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(token: &str, chat: &str, webhook: &str) -> Config {
        let raw = serde_json::json!({
            "telegram_bot_token": token,
            "telegram_chat_id": chat,
            "discord_webhook_url": webhook,
            "items": [{"id": "B000A", "priority": "normal"}],
        });
        serde_json::from_value(raw).expect("valid config")
    }

    #[test]
    fn builds_channels_from_credentials() {
        assert_eq!(build_notifiers(&config_with("", "", "")).len(), 0);
        assert_eq!(build_notifiers(&config_with("t", "c", "")).len(), 1);
        assert_eq!(build_notifiers(&config_with("", "", "https://hook")).len(), 1);

        let both = build_notifiers(&config_with("t", "c", "https://hook"));
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].name(), "telegram");
        assert_eq!(both[1].name(), "discord");
    }

    #[test]
    fn telegram_needs_both_token_and_chat() {
        assert_eq!(build_notifiers(&config_with("t", "", "")).len(), 0);
        assert_eq!(build_notifiers(&config_with("", "c", "")).len(), 0);
    }
}
