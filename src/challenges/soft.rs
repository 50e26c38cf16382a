//! Soft challenge: a "Continue shopping" button served with HTTP 200 and a
//! form POST to `/errors/validateCaptcha`. No puzzle, no text input; the
//! page just wants a click.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::ChallengeStrategy;
use crate::session::pause_range;

const CONTINUE_PHRASE: &str = "click the button below to continue shopping";

static CHALLENGE_FORM_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"form[action="/errors/validateCaptcha"]"#).expect("invalid selector")
});

pub struct SoftChallengeStrategy;

#[async_trait]
impl ChallengeStrategy for SoftChallengeStrategy {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn detect(&self, html: &str) -> bool {
        let doc = Html::parse_document(html);
        if doc.select(&CHALLENGE_FORM_SEL).next().is_some() {
            return true;
        }
        doc.root_element()
            .text()
            .collect::<String>()
            .to_lowercase()
            .contains(CONTINUE_PHRASE)
    }

    async fn solve(&self, page: &Page) -> bool {
        info!("soft challenge detected, dismissing");

        let button = match page.find_element("button.a-button-text").await {
            Ok(el) => Some(el),
            Err(_) => page.find_element(r#"button[type="submit"]"#).await.ok(),
        };
        let Some(button) = button else {
            warn!("challenge page has no dismissal button");
            return false;
        };

        pause_range(0.5, 1.5).await;
        if let Err(err) = button.click().await {
            warn!(error = %err, "challenge dismissal click failed");
            return false;
        }

        match tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => debug!(error = %err, "navigation after dismissal reported an error"),
            Err(_) => debug!("page did not settle after dismissal"),
        }
        pause_range(1.0, 2.0).await;

        if let Ok(Some(url)) = page.url().await {
            info!(url = %url, "challenge dismissed");
        }
        true
    }
}
